use actix_web::{HttpRequest, HttpResponse, ResponseError, Result as ActixResult, http::header};
use std::sync::Arc;

use super::FileService;
use crate::errors::{Result, TaskDropError};
use crate::models::files::File;
use crate::models::users::entities::{User, UserRole};
use crate::services::current_user;
use crate::storage::Storage;

/// 只有提交该文件的学生和任务所有者可以下载
pub async fn authorize_download(
    storage: &Arc<dyn Storage>,
    user: &User,
    file_id: i64,
) -> Result<File> {
    let file = storage
        .get_file_by_id(file_id)
        .await?
        .filter(|file| !file.is_deleted)
        .ok_or_else(|| TaskDropError::not_found("文件不存在"))?;

    let allowed = match user.role {
        UserRole::Student => file.student_id == user.id,
        UserRole::Teacher => match storage.get_task_by_id(file.task_id).await? {
            Some(task) => task.is_owned_by(user.id),
            None => return Err(TaskDropError::not_found("文件不存在")),
        },
    };
    if !allowed {
        return Err(TaskDropError::authorization("无权下载该文件"));
    }
    Ok(file)
}

pub async fn handle_download(
    service: &FileService,
    request: &HttpRequest,
    file_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let user = current_user(request)?;
        let storage = service.get_storage(request)?;
        let file = authorize_download(&storage, &user, file_id).await?;
        let bytes = std::fs::read(&file.file_path).map_err(|e| {
            tracing::error!("Failed to read {}: {}", file.file_path, e);
            TaskDropError::not_found("文件不存在")
        })?;
        Ok::<_, TaskDropError>((file, bytes))
    }
    .await;

    match result {
        // 使用数据库中的原始文件名
        Ok((file, bytes)) => Ok(HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, file.content_type.clone()))
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.original_name),
            ))
            .body(bytes)),
        Err(e) => Ok(e.error_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::submissions::submit::{
        submit,
        tests::{fixture, stored_file},
    };

    #[tokio::test]
    async fn test_download_permissions_and_tombstones() {
        let f = fixture().await;
        let first = stored_file(&f.upload_dir, "a.pdf", b"%PDF one");
        let submission = submit(&f.storage, &f.student, f.task.id, vec![first], &f.upload_dir, f.now)
            .await
            .unwrap();
        let file_id = submission.files[0].id;

        assert!(authorize_download(&f.storage, &f.student, file_id).await.is_ok());
        assert!(authorize_download(&f.storage, &f.teacher, file_id).await.is_ok());

        let stranger = User {
            id: f.student.id + 100,
            ..f.student.clone()
        };
        let err = authorize_download(&f.storage, &stranger, file_id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        // 重新提交后旧文件被标记删除
        let second = stored_file(&f.upload_dir, "b.pdf", b"%PDF two");
        submit(&f.storage, &f.student, f.task.id, vec![second], &f.upload_dir, f.now)
            .await
            .unwrap();
        let err = authorize_download(&f.storage, &f.student, file_id)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));
    }
}
