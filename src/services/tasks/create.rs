use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::TaskService;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::tasks::{Task, lifecycle, requests::CreateTaskRequest};
use crate::models::users::entities::User;
use crate::services::{current_user, respond_created};
use crate::storage::Storage;

/// 创建草稿任务；提供学生名单时在同一事务内写入分配
pub async fn create_task(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    req: CreateTaskRequest,
    default_max_file_size: i64,
    now: DateTime<Utc>,
) -> Result<Task> {
    let fields = lifecycle::prepare_create(&req, default_max_file_size)?;
    let task = storage
        .create_task(teacher.id, fields, req.student_ids)
        .await?;

    tracing::info!(
        "Teacher {} created task {} with {} students",
        teacher.id,
        task.id,
        task.total_students
    );
    Ok(task.with_effective_status(now))
}

pub async fn handle_create_task(
    service: &TaskService,
    request: &HttpRequest,
    req: CreateTaskRequest,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        let default_max = AppConfig::get().task.default_max_file_size;
        create_task(&storage, &teacher, req, default_max, Utc::now()).await
    }
    .await;
    Ok(respond_created(result, "任务创建成功"))
}
