pub mod assign;
pub mod create;
pub mod detail;
pub mod list;
pub mod stats;
pub mod status;
pub mod update;

use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use std::sync::Arc;

use crate::errors::{Result, TaskDropError};
use crate::models::tasks::Task;
use crate::models::tasks::requests::{
    AssignStudentsRequest, CreateTaskRequest, TaskListParams, UpdateTaskRequest,
};
use crate::storage::Storage;

pub struct TaskService {
    storage: Option<Arc<dyn Storage>>,
}

impl TaskService {
    pub fn new_lazy() -> Self {
        Self { storage: None }
    }

    pub(crate) fn get_storage(&self, request: &HttpRequest) -> Result<Arc<dyn Storage>> {
        match &self.storage {
            Some(storage) => Ok(storage.clone()),
            None => super::storage_from_request(request),
        }
    }

    pub async fn create_task(
        &self,
        request: &HttpRequest,
        req: CreateTaskRequest,
    ) -> ActixResult<HttpResponse> {
        create::handle_create_task(self, request, req).await
    }

    pub async fn update_task(
        &self,
        request: &HttpRequest,
        task_id: i64,
        req: UpdateTaskRequest,
    ) -> ActixResult<HttpResponse> {
        update::handle_update_task(self, request, task_id, req).await
    }

    pub async fn publish_task(
        &self,
        request: &HttpRequest,
        task_id: i64,
    ) -> ActixResult<HttpResponse> {
        status::handle_publish_task(self, request, task_id).await
    }

    pub async fn complete_task(
        &self,
        request: &HttpRequest,
        task_id: i64,
    ) -> ActixResult<HttpResponse> {
        status::handle_complete_task(self, request, task_id).await
    }

    pub async fn delete_task(
        &self,
        request: &HttpRequest,
        task_id: i64,
    ) -> ActixResult<HttpResponse> {
        status::handle_delete_task(self, request, task_id).await
    }

    pub async fn get_task(&self, request: &HttpRequest, task_id: i64) -> ActixResult<HttpResponse> {
        detail::handle_get_task(self, request, task_id).await
    }

    pub async fn list_tasks(
        &self,
        request: &HttpRequest,
        query: TaskListParams,
    ) -> ActixResult<HttpResponse> {
        list::handle_list_tasks(self, request, query).await
    }

    pub async fn assign_students(
        &self,
        request: &HttpRequest,
        task_id: i64,
        req: AssignStudentsRequest,
    ) -> ActixResult<HttpResponse> {
        assign::handle_assign_students(self, request, task_id, req).await
    }

    pub async fn get_statistics(
        &self,
        request: &HttpRequest,
        task_id: i64,
    ) -> ActixResult<HttpResponse> {
        stats::handle_task_statistics(self, request, task_id).await
    }

    pub async fn get_students_status(
        &self,
        request: &HttpRequest,
        task_id: i64,
    ) -> ActixResult<HttpResponse> {
        stats::handle_students_status(self, request, task_id).await
    }

    pub async fn get_file_statistics(
        &self,
        request: &HttpRequest,
        task_id: i64,
    ) -> ActixResult<HttpResponse> {
        stats::handle_file_statistics(self, request, task_id).await
    }
}

/// 读取未删除的任务，不存在时返回 NotFound
pub(crate) async fn load_task(storage: &Arc<dyn Storage>, task_id: i64) -> Result<Task> {
    storage
        .get_task_by_id(task_id)
        .await?
        .ok_or_else(|| TaskDropError::not_found("任务不存在"))
}
