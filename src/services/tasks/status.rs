use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{TaskService, load_task};
use crate::errors::Result;
use crate::models::tasks::{Task, TaskStatus, lifecycle};
use crate::models::users::entities::User;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 带条件的状态迁移，并发请求中只有一个能从 `from` 迁出
async fn transition(
    storage: &Arc<dyn Storage>,
    task_id: i64,
    from: TaskStatus,
    to: TaskStatus,
    now: DateTime<Utc>,
) -> Result<Task> {
    storage.transition_task_status(task_id, from, to).await?;
    Ok(load_task(storage, task_id).await?.with_effective_status(now))
}

/// 发布：draft -> active
pub async fn publish_task(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
    now: DateTime<Utc>,
) -> Result<Task> {
    let task = load_task(storage, task_id).await?;
    lifecycle::check_publish(&task, teacher.id)?;
    let task = transition(storage, task_id, TaskStatus::Draft, TaskStatus::Active, now).await?;
    tracing::info!("Task {} published by teacher {}", task_id, teacher.id);
    Ok(task)
}

/// 手动结束任务，之后任务不可再修改
pub async fn complete_task(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
    now: DateTime<Utc>,
) -> Result<Task> {
    let task = load_task(storage, task_id).await?;
    lifecycle::check_complete(&task, teacher.id, now)?;
    // 可结束的任务存储状态一定是 active
    let task = transition(storage, task_id, TaskStatus::Active, TaskStatus::Completed, now).await?;
    tracing::info!("Task {} completed by teacher {}", task_id, teacher.id);
    Ok(task)
}

/// 软删除，进行中的任务不能删除
pub async fn delete_task(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let task = load_task(storage, task_id).await?;
    lifecycle::check_delete(&task, teacher.id, now)?;
    storage.soft_delete_task(task_id, now.timestamp()).await?;
    super::stats::invalidate_statistics(task_id).await;
    tracing::info!("Task {} deleted by teacher {}", task_id, teacher.id);
    Ok(())
}

pub async fn handle_publish_task(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        publish_task(&storage, &teacher, task_id, Utc::now()).await
    }
    .await;
    Ok(respond(result, "任务已发布"))
}

pub async fn handle_complete_task(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        complete_task(&storage, &teacher, task_id, Utc::now()).await
    }
    .await;
    Ok(respond(result, "任务已结束"))
}

pub async fn handle_delete_task(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        delete_task(&storage, &teacher, task_id, Utc::now()).await
    }
    .await;
    Ok(respond(result, "任务已删除"))
}
