use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::TaskService;
use crate::errors::Result;
use crate::models::tasks::requests::{TaskListParams, TaskListQuery};
use crate::models::tasks::responses::TaskListResponse;
use crate::models::users::entities::{User, UserRole};
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 按角色列出任务：教师看自己创建的，学生看分配给自己的已发布任务
pub async fn list_tasks(
    storage: &Arc<dyn Storage>,
    user: &User,
    params: &TaskListParams,
    now: DateTime<Utc>,
) -> Result<TaskListResponse> {
    let query = TaskListQuery::from_params(params, now);
    match user.role {
        UserRole::Teacher => storage.list_teacher_tasks(user.id, query).await,
        UserRole::Student => storage.list_student_tasks(user.id, query).await,
    }
}

pub async fn handle_list_tasks(
    service: &TaskService,
    request: &HttpRequest,
    params: TaskListParams,
) -> ActixResult<HttpResponse> {
    let result = async {
        let user = current_user(request)?;
        let storage = service.get_storage(request)?;
        list_tasks(&storage, &user, &params, Utc::now()).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaginationQuery;
    use crate::models::tasks::TaskStatus;
    use crate::services::tasks::create::{create_task, tests::create_request};
    use crate::services::tasks::status::publish_task;
    use crate::storage::sea_orm_storage::test_support;

    #[tokio::test]
    async fn test_list_by_role() {
        let storage = test_support::storage().await;
        let teacher = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let student = test_support::user(&storage, "s1", UserRole::Student).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let now = Utc::now();

        let draft = create_task(
            &storage,
            &teacher,
            create_request(now, Some(vec![student.id])),
            4096,
            now,
        )
        .await
        .unwrap();
        let live = create_task(
            &storage,
            &teacher,
            create_request(now, Some(vec![student.id])),
            4096,
            now,
        )
        .await
        .unwrap();
        publish_task(&storage, &teacher, live.id, now).await.unwrap();

        let params = TaskListParams {
            pagination: PaginationQuery::default(),
            status: None,
        };
        let teacher_view = list_tasks(&storage, &teacher, &params, now).await.unwrap();
        assert_eq!(teacher_view.items.len(), 2);

        let student_view = list_tasks(&storage, &student, &params, now).await.unwrap();
        assert_eq!(student_view.items.len(), 1);
        assert_eq!(student_view.items[0].id, live.id);

        let drafts_only = TaskListParams {
            pagination: PaginationQuery::default(),
            status: Some(TaskStatus::Draft),
        };
        let filtered = list_tasks(&storage, &teacher, &drafts_only, now).await.unwrap();
        assert_eq!(filtered.items.len(), 1);
        assert_eq!(filtered.items[0].id, draft.id);
    }
}
