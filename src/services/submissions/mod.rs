pub mod detail;
pub mod list;
pub mod review;
pub mod submit;

use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use std::sync::Arc;

use crate::errors::Result;
use crate::models::submissions::requests::{ReviewRequest, SubmissionListParams, SubmitRequest};
use crate::storage::Storage;

pub struct SubmissionService {
    storage: Option<Arc<dyn Storage>>,
}

impl SubmissionService {
    pub fn new_lazy() -> Self {
        Self { storage: None }
    }

    pub(crate) fn get_storage(&self, request: &HttpRequest) -> Result<Arc<dyn Storage>> {
        match &self.storage {
            Some(storage) => Ok(storage.clone()),
            None => super::storage_from_request(request),
        }
    }

    // 学生提交作业
    pub async fn submit(
        &self,
        request: &HttpRequest,
        task_id: i64,
        req: SubmitRequest,
    ) -> ActixResult<HttpResponse> {
        submit::handle_submit(self, request, task_id, req).await
    }

    // 教师批阅
    pub async fn review(
        &self,
        request: &HttpRequest,
        submission_id: i64,
        req: ReviewRequest,
    ) -> ActixResult<HttpResponse> {
        review::handle_review(self, request, submission_id, req).await
    }

    pub async fn get_submission(
        &self,
        request: &HttpRequest,
        submission_id: i64,
    ) -> ActixResult<HttpResponse> {
        detail::handle_get_submission(self, request, submission_id).await
    }

    // 学生在某个任务下的提交
    pub async fn get_my_submission(
        &self,
        request: &HttpRequest,
        task_id: i64,
    ) -> ActixResult<HttpResponse> {
        detail::handle_get_my_submission(self, request, task_id).await
    }

    pub async fn list_by_task(
        &self,
        request: &HttpRequest,
        task_id: i64,
        params: SubmissionListParams,
    ) -> ActixResult<HttpResponse> {
        list::handle_list_by_task(self, request, task_id, params).await
    }

    pub async fn list_mine(
        &self,
        request: &HttpRequest,
        params: SubmissionListParams,
    ) -> ActixResult<HttpResponse> {
        list::handle_list_mine(self, request, params).await
    }
}
