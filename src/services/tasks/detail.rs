use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{TaskService, load_task};
use crate::errors::{Result, TaskDropError};
use crate::models::tasks::{TaskStatus, responses::TaskDetailResponse};
use crate::models::users::{
    entities::{User, UserRole},
    responses::StudentBrief,
};
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 任务详情：所有者可见全部内容和学生名单；已分配的学生可见已发布任务
pub async fn get_task(
    storage: &Arc<dyn Storage>,
    user: &User,
    task_id: i64,
    now: DateTime<Utc>,
) -> Result<TaskDetailResponse> {
    let task = load_task(storage, task_id).await?;

    match user.role {
        UserRole::Teacher => {
            if !task.is_owned_by(user.id) {
                return Err(TaskDropError::authorization("无权查看此任务"));
            }
            let students = storage
                .get_task_students(task_id)
                .await?
                .iter()
                .map(StudentBrief::from)
                .collect();
            Ok(TaskDetailResponse {
                task: task.with_effective_status(now),
                students,
            })
        }
        UserRole::Student => {
            // 草稿对学生不可见
            if task.status == TaskStatus::Draft {
                return Err(TaskDropError::not_found("任务不存在"));
            }
            if !storage.is_student_assigned(task_id, user.id).await? {
                return Err(TaskDropError::authorization("该任务未分配给您"));
            }
            Ok(TaskDetailResponse {
                task: task.with_effective_status(now),
                students: Vec::new(),
            })
        }
    }
}

pub async fn handle_get_task(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let user = current_user(request)?;
        let storage = service.get_storage(request)?;
        get_task(&storage, &user, task_id, Utc::now()).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tasks::create::{create_task, tests::create_request};
    use crate::services::tasks::status::publish_task;
    use crate::storage::sea_orm_storage::test_support;
    use chrono::Duration;

    #[tokio::test]
    async fn test_detail_visibility() {
        let storage = test_support::storage().await;
        let owner = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let other = test_support::user(&storage, "t2", UserRole::Teacher).await;
        let assigned = test_support::user(&storage, "s1", UserRole::Student).await;
        let outsider = test_support::user(&storage, "s2", UserRole::Student).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let now = Utc::now();

        let task = create_task(
            &storage,
            &owner,
            create_request(now, Some(vec![assigned.id])),
            4096,
            now,
        )
        .await
        .unwrap();

        let detail = get_task(&storage, &owner, task.id, now).await.unwrap();
        assert_eq!(detail.students.len(), 1);
        assert_eq!(detail.students[0].id, assigned.id);

        let err = get_task(&storage, &other, task.id, now).await.unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        // 草稿对学生不可见
        let err = get_task(&storage, &assigned, task.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));

        publish_task(&storage, &owner, task.id, now).await.unwrap();
        let seen = get_task(&storage, &assigned, task.id, now).await.unwrap();
        assert!(seen.students.is_empty());

        let err = get_task(&storage, &outsider, task.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        // 截止后读取到的是推导出的 expired
        let later = now + Duration::days(2);
        let expired = get_task(&storage, &assigned, task.id, later).await.unwrap();
        assert_eq!(expired.task.status, TaskStatus::Expired);
    }
}
