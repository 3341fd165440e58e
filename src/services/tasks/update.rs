use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{TaskService, load_task};
use crate::errors::Result;
use crate::models::tasks::{Task, lifecycle, requests::UpdateTaskRequest};
use crate::models::users::entities::User;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 稀疏更新任务字段；提供学生名单时一并替换
pub async fn update_task(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
    patch: UpdateTaskRequest,
    now: DateTime<Utc>,
) -> Result<Task> {
    let task = load_task(storage, task_id).await?;
    let fields = lifecycle::apply_update(&task, teacher.id, &patch)?;
    let reassigned = patch.student_ids.is_some();

    let updated = storage.update_task(task_id, fields, patch.student_ids).await?;
    if reassigned {
        super::stats::invalidate_statistics(task_id).await;
    }
    Ok(updated.with_effective_status(now))
}

pub async fn handle_update_task(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
    patch: UpdateTaskRequest,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        update_task(&storage, &teacher, task_id, patch, Utc::now()).await
    }
    .await;
    Ok(respond(result, "任务更新成功"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TaskDropError;
    use crate::models::tasks::TaskStatus;
    use crate::models::users::entities::UserRole;
    use crate::services::tasks::create::{create_task, tests::create_request};
    use crate::storage::sea_orm_storage::test_support;

    #[tokio::test]
    async fn test_sparse_update_keeps_absent_fields() {
        let storage = test_support::storage().await;
        let teacher = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let now = Utc::now();

        let mut req = create_request(now, None);
        req.description = Some("first draft".to_string());
        let task = create_task(&storage, &teacher, req, 4096, now).await.unwrap();

        let updated = update_task(
            &storage,
            &teacher,
            task.id,
            UpdateTaskRequest {
                title: Some("Essay v2".to_string()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "Essay v2");
        assert_eq!(updated.description.as_deref(), Some("first draft"));
        assert_eq!(updated.end_time.timestamp(), task.end_time.timestamp());

        // 空字符串清空描述
        let cleared = update_task(
            &storage,
            &teacher,
            task.id,
            UpdateTaskRequest {
                description: Some(String::new()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(cleared.description, None);
    }

    #[tokio::test]
    async fn test_update_rejects_foreign_teacher_and_completed_task() {
        let storage = test_support::storage().await;
        let owner = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let other = test_support::user(&storage, "t2", UserRole::Teacher).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let now = Utc::now();

        let task = create_task(&storage, &owner, create_request(now, None), 4096, now)
            .await
            .unwrap();

        let err = update_task(&storage, &other, task.id, UpdateTaskRequest::default(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        storage
            .transition_task_status(task.id, TaskStatus::Draft, TaskStatus::Completed)
            .await
            .unwrap();
        let err = update_task(&storage, &owner, task.id, UpdateTaskRequest::default(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::State(_)));
    }
}
