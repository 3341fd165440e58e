use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use std::sync::Arc;

use super::SubmissionService;
use crate::errors::Result;
use crate::models::submissions::requests::{SubmissionListParams, SubmissionListQuery};
use crate::models::submissions::responses::SubmissionListResponse;
use crate::models::tasks::lifecycle;
use crate::models::users::entities::User;
use crate::services::tasks::load_task;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 任务下的提交，按提交时间倒序
pub async fn list_by_task(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
    query: SubmissionListQuery,
) -> Result<SubmissionListResponse> {
    let task = load_task(storage, task_id).await?;
    lifecycle::ensure_owner(&task, teacher.id)?;
    storage.list_submissions_by_task(task_id, query).await
}

pub async fn list_mine(
    storage: &Arc<dyn Storage>,
    student: &User,
    query: SubmissionListQuery,
) -> Result<SubmissionListResponse> {
    storage.list_submissions_by_student(student.id, query).await
}

pub async fn handle_list_by_task(
    service: &SubmissionService,
    request: &HttpRequest,
    task_id: i64,
    params: SubmissionListParams,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        list_by_task(&storage, &teacher, task_id, SubmissionListQuery::from(&params)).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

pub async fn handle_list_mine(
    service: &SubmissionService,
    request: &HttpRequest,
    params: SubmissionListParams,
) -> ActixResult<HttpResponse> {
    let result = async {
        let student = current_user(request)?;
        let storage = service.get_storage(request)?;
        list_mine(&storage, &student, SubmissionListQuery::from(&params)).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TaskDropError;
    use crate::models::submissions::SubmissionStatus;
    use crate::services::submissions::submit::{
        submit,
        tests::{fixture, stored_file},
    };

    #[tokio::test]
    async fn test_lists_and_filters() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF");
        submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();

        let all = list_by_task(&f.storage, &f.teacher, f.task.id, SubmissionListQuery::default())
            .await
            .unwrap();
        assert_eq!(all.items.len(), 1);
        assert_eq!(all.pagination.total, 1);

        let late_only = SubmissionListQuery {
            status: Some(SubmissionStatus::Late),
            ..Default::default()
        };
        let none = list_by_task(&f.storage, &f.teacher, f.task.id, late_only)
            .await
            .unwrap();
        assert!(none.items.is_empty());

        let mine = list_mine(&f.storage, &f.student, SubmissionListQuery::default())
            .await
            .unwrap();
        assert_eq!(mine.items.len(), 1);

        let err = list_by_task(&f.storage, &f.student, f.task.id, SubmissionListQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));
    }
}
