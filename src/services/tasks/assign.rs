use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{TaskService, load_task};
use crate::errors::Result;
use crate::models::tasks::{Task, lifecycle, requests::AssignStudentsRequest};
use crate::models::users::entities::User;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 整体替换任务的学生名单，已有提交记录不受影响
pub async fn assign_students(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
    student_ids: Vec<i64>,
    now: DateTime<Utc>,
) -> Result<Task> {
    let task = load_task(storage, task_id).await?;
    lifecycle::check_assign(&task, teacher.id)?;

    let task = storage.assign_students(task_id, student_ids).await?;
    super::stats::invalidate_statistics(task_id).await;
    tracing::info!(
        "Task {} now has {} assigned students",
        task_id,
        task.total_students
    );
    Ok(task.with_effective_status(now))
}

pub async fn handle_assign_students(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
    req: AssignStudentsRequest,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        assign_students(&storage, &teacher, task_id, req.student_ids, Utc::now()).await
    }
    .await;
    Ok(respond(result, "学生名单已更新"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TaskDropError;
    use crate::models::users::entities::UserRole;
    use crate::services::tasks::create::{create_task, tests::create_request};
    use crate::storage::sea_orm_storage::test_support;

    #[tokio::test]
    async fn test_assignment_replaces_previous_set() {
        let storage = test_support::storage().await;
        let teacher = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let s1 = test_support::user(&storage, "s1", UserRole::Student).await;
        let s2 = test_support::user(&storage, "s2", UserRole::Student).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let now = Utc::now();

        let task = create_task(
            &storage,
            &teacher,
            create_request(now, Some(vec![s1.id])),
            4096,
            now,
        )
        .await
        .unwrap();

        let task = assign_students(&storage, &teacher, task.id, vec![s2.id], now)
            .await
            .unwrap();
        assert_eq!(task.total_students, 1);
        assert!(!storage.is_student_assigned(task.id, s1.id).await.unwrap());
        assert!(storage.is_student_assigned(task.id, s2.id).await.unwrap());

        // 教师 ID 不是学生，整体回滚
        let err = assign_students(&storage, &teacher, task.id, vec![s1.id, teacher.id], now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));
        assert!(storage.is_student_assigned(task.id, s2.id).await.unwrap());
        assert!(!storage.is_student_assigned(task.id, s1.id).await.unwrap());
    }
}
