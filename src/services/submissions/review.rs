use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::SubmissionService;
use crate::errors::{Result, TaskDropError};
use crate::models::submissions::{Submission, lifecycle, requests::ReviewRequest};
use crate::models::users::entities::User;
use crate::services::tasks::stats::invalidate_statistics;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 批阅提交；重复批阅会覆盖分数、评语和批阅时间
pub async fn review(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    submission_id: i64,
    req: ReviewRequest,
    now: DateTime<Utc>,
) -> Result<Submission> {
    let submission = storage
        .get_submission_by_id(submission_id)
        .await?
        .ok_or_else(|| TaskDropError::not_found("提交不存在"))?;
    let task = storage
        .get_task_by_id(submission.task_id)
        .await?
        .ok_or_else(|| TaskDropError::not_found("任务不存在"))?;
    lifecycle::check_review(&task, teacher.id, &req)?;

    let reviewed = storage
        .review_submission(submission_id, teacher.id, req, now)
        .await?;
    invalidate_statistics(task.id).await;
    tracing::info!(
        "Submission {} reviewed by teacher {}",
        submission_id,
        teacher.id
    );
    Ok(reviewed)
}

pub async fn handle_review(
    service: &SubmissionService,
    request: &HttpRequest,
    submission_id: i64,
    req: ReviewRequest,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        review(&storage, &teacher, submission_id, req, Utc::now()).await
    }
    .await;
    Ok(respond(result, "批阅成功"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::submissions::SubmissionStatus;
    use crate::models::users::entities::UserRole;
    use crate::services::submissions::submit::{
        submit,
        tests::{fixture, stored_file},
    };
    use crate::storage::sea_orm_storage::test_support;
    use chrono::Duration;

    fn review_request(score: f64, comment: &str) -> ReviewRequest {
        ReviewRequest {
            score: Some(score),
            comment: Some(comment.to_string()),
        }
    }

    #[tokio::test]
    async fn test_review_and_overwrite() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF");
        let submission = submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();

        let first = review(&f.storage, &f.teacher, submission.id, review_request(80.0, "ok"), f.now)
            .await
            .unwrap();
        assert_eq!(first.status, SubmissionStatus::Reviewed);
        assert_eq!(first.score, Some(80.0));
        assert_eq!(first.reviewed_by, Some(f.teacher.id));

        let later = f.now + Duration::hours(1);
        let second = review(
            &f.storage,
            &f.teacher,
            submission.id,
            review_request(95.0, "great"),
            later,
        )
        .await
        .unwrap();
        assert_eq!(second.score, Some(95.0));
        assert_eq!(second.comment.as_deref(), Some("great"));
        assert_eq!(
            second.reviewed_at.map(|t| t.timestamp()),
            Some(later.timestamp())
        );
    }

    #[tokio::test]
    async fn test_foreign_teacher_review_leaves_submission_untouched() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF");
        let submission = submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();

        let intruder = User {
            id: f.teacher.id + 100,
            role: UserRole::Teacher,
            ..f.teacher.clone()
        };
        let err = review(&f.storage, &intruder, submission.id, review_request(10.0, "x"), f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        let stored = f
            .storage
            .get_submission_by_id(submission.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubmissionStatus::Submitted);
        assert_eq!(stored.score, None);
        assert_eq!(stored.reviewed_by, None);
    }

    #[tokio::test]
    async fn test_review_missing_submission() {
        let storage = test_support::storage().await;
        let teacher = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);

        let err = review(&storage, &teacher, 404, review_request(1.0, ""), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));
    }
}
