use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use std::sync::Arc;

use super::SubmissionService;
use crate::errors::{Result, TaskDropError};
use crate::models::submissions::{Submission, lifecycle};
use crate::models::users::entities::User;
use crate::services::tasks::load_task;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 提交详情：学生只能看自己的，教师只能看自己任务下的
pub async fn get_submission(
    storage: &Arc<dyn Storage>,
    user: &User,
    submission_id: i64,
) -> Result<Submission> {
    let submission = storage
        .get_submission_by_id(submission_id)
        .await?
        .ok_or_else(|| TaskDropError::not_found("提交不存在"))?;
    let task = load_task(storage, submission.task_id).await?;
    lifecycle::check_view(user, &submission, &task)?;
    Ok(submission)
}

/// 学生自己在某个任务下的提交，任务已删除时同样返回不存在
pub async fn get_my_submission(
    storage: &Arc<dyn Storage>,
    student: &User,
    task_id: i64,
) -> Result<Submission> {
    load_task(storage, task_id).await?;
    storage
        .get_submission_by_task_and_student(task_id, student.id)
        .await?
        .ok_or_else(|| TaskDropError::not_found("尚未提交"))
}

pub async fn handle_get_submission(
    service: &SubmissionService,
    request: &HttpRequest,
    submission_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let user = current_user(request)?;
        let storage = service.get_storage(request)?;
        get_submission(&storage, &user, submission_id).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

pub async fn handle_get_my_submission(
    service: &SubmissionService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let student = current_user(request)?;
        let storage = service.get_storage(request)?;
        get_my_submission(&storage, &student, task_id).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::entities::UserRole;
    use crate::services::submissions::submit::{
        submit,
        tests::{fixture, stored_file},
    };
    use crate::services::tasks::status::{complete_task, delete_task};
    use chrono::Duration;

    #[tokio::test]
    async fn test_view_permissions() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF");
        let submission = submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();

        assert!(get_submission(&f.storage, &f.student, submission.id).await.is_ok());
        assert!(get_submission(&f.storage, &f.teacher, submission.id).await.is_ok());

        let classmate = User {
            id: f.student.id + 100,
            ..f.student.clone()
        };
        let err = get_submission(&f.storage, &classmate, submission.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        let other_teacher = User {
            id: f.teacher.id + 100,
            role: UserRole::Teacher,
            ..f.teacher.clone()
        };
        let err = get_submission(&f.storage, &other_teacher, submission.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        let mine = get_my_submission(&f.storage, &f.student, f.task.id).await.unwrap();
        assert_eq!(mine.id, submission.id);
        let err = get_my_submission(&f.storage, &classmate, f.task.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deleted_task_hides_submissions() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF");
        let submission = submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();

        complete_task(&f.storage, &f.teacher, f.task.id, f.now).await.unwrap();
        let later = f.task.end_time + Duration::days(1);
        delete_task(&f.storage, &f.teacher, f.task.id, later).await.unwrap();

        let err = get_my_submission(&f.storage, &f.student, f.task.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));
        let err = get_submission(&f.storage, &f.student, submission.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));
    }
}
