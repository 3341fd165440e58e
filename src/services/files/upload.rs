use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result as ActixResult};
use futures_util::TryStreamExt;
use futures_util::stream::StreamExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::{FileService, hex_digest};
use crate::config::AppConfig;
use crate::errors::{Result, TaskDropError};
use crate::models::files::{FileDescriptor, FileUploadResponse};
use crate::models::{ApiResponse, ErrorCode};
use crate::services::current_user;
use crate::storage::Storage;
use crate::utils::{content_type_for, validate_magic_bytes};

/// 提取小写扩展名并检查是否在允许列表中
pub fn allowed_extension(original_name: &str, allowed_types: &[String]) -> Option<String> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))?;
    allowed_types
        .iter()
        .any(|t| t.to_lowercase() == extension)
        .then_some(extension)
}

/// 生成存储文件名：`{时间戳}-{uuid}{扩展名}`
pub fn generate_stored_name(extension: &str) -> String {
    format!(
        "{}-{}{}",
        chrono::Utc::now().timestamp(),
        Uuid::new_v4(),
        extension
    )
}

/// 文件已落盘后，查询内容相同的已有文件并构建响应
pub async fn finish_upload(
    storage: &Arc<dyn Storage>,
    file: FileDescriptor,
) -> Result<FileUploadResponse> {
    let duplicate_of = storage
        .find_file_by_hash(&file.file_hash)
        .await?
        .map(|existing| existing.id);
    Ok(FileUploadResponse {
        file,
        duplicate_of,
        uploaded_at: chrono::Utc::now(),
    })
}

fn upload_error(code: ErrorCode, message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::error_empty(code, message))
}

pub async fn handle_upload(
    service: &FileService,
    req: &HttpRequest,
    mut payload: Multipart,
) -> ActixResult<HttpResponse> {
    let user = match current_user(req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    let config = AppConfig::get();
    let upload_dir = Path::new(&config.upload.dir);
    let max_size = config.upload.max_size;
    let allowed_types = &config.upload.allowed_types;

    // 确保上传目录存在
    if !upload_dir.exists()
        && let Err(e) = fs::create_dir_all(upload_dir)
    {
        tracing::error!("{}", TaskDropError::file_operation(format!("{e}")));
        return Ok(
            HttpResponse::InternalServerError().json(ApiResponse::<()>::error_empty(
                ErrorCode::FileUploadFailed,
                "创建上传目录失败",
            )),
        );
    }

    let mut uploaded: Option<FileDescriptor> = None;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let content_disposition = field.content_disposition();
        let name = content_disposition
            .and_then(|cd| cd.get_name())
            .unwrap_or_default()
            .to_string();

        if name != "file" {
            continue;
        }
        if uploaded.is_some() {
            return Ok(upload_error(
                ErrorCode::MultifileUploadNotAllowed,
                "一次只能上传一个文件",
            ));
        }

        let original_name = content_disposition
            .and_then(|cd| cd.get_filename())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let Some(extension) = allowed_extension(&original_name, allowed_types) else {
            return Ok(upload_error(
                ErrorCode::FileTypeNotAllowed,
                "文件类型不被允许",
            ));
        };

        let stored_name = generate_stored_name(&extension);
        let file_path = upload_dir.join(&stored_name);
        let mut f = match File::create(&file_path) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("{}", TaskDropError::file_operation(format!("{e}")));
                return Ok(HttpResponse::InternalServerError().json(
                    ApiResponse::<()>::error_empty(ErrorCode::FileUploadFailed, "文件创建失败"),
                ));
            }
        };

        let mut hasher = Sha256::new();
        let mut total_size: usize = 0;
        let mut first_chunk = true;
        while let Some(chunk) = field.next().await {
            let data = chunk?;

            // 第一个 chunk 时验证魔术字节
            if first_chunk {
                first_chunk = false;
                if !validate_magic_bytes(&data, &extension) {
                    let _ = fs::remove_file(&file_path);
                    return Ok(upload_error(
                        ErrorCode::FileTypeNotAllowed,
                        "文件内容与扩展名不匹配",
                    ));
                }
            }

            total_size += data.len();
            // 校验大小
            if total_size > max_size {
                let _ = fs::remove_file(&file_path);
                return Ok(upload_error(
                    ErrorCode::FileSizeExceeded,
                    "文件大小超过限制",
                ));
            }
            hasher.update(&data);
            f.write_all(&data)?;
        }

        if total_size == 0 {
            let _ = fs::remove_file(&file_path);
            return Ok(upload_error(ErrorCode::FileUploadFailed, "文件内容为空"));
        }

        uploaded = Some(FileDescriptor {
            original_name,
            stored_name,
            file_path: file_path.to_string_lossy().into_owned(),
            file_size: total_size as i64,
            content_type: content_type_for(&extension).to_string(),
            file_hash: hex_digest(hasher.finalize().as_slice()),
        });
    }

    let Some(file) = uploaded else {
        return Ok(upload_error(
            ErrorCode::FileNotFound,
            "请求中没有文件",
        ));
    };

    tracing::info!(
        "User {} uploaded {} ({} bytes)",
        user.id,
        file.stored_name,
        file.file_size
    );

    let result = match service.get_storage(req) {
        Ok(storage) => finish_upload(&storage, file).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => {
            Ok(HttpResponse::Ok().json(ApiResponse::success(response, "文件上传成功")))
        }
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
    use crate::utils::validate::is_safe_stored_name;

    #[test]
    fn test_allowed_extension() {
        let allowed = vec![".pdf".to_string(), ".docx".to_string()];
        assert_eq!(
            allowed_extension("Report.PDF", &allowed).as_deref(),
            Some(".pdf")
        );
        assert_eq!(allowed_extension("virus.exe", &allowed), None);
        assert_eq!(allowed_extension("noext", &allowed), None);
    }

    #[test]
    fn test_stored_name_shape() {
        let name = generate_stored_name(".pdf");
        assert!(name.ends_with(".pdf"));
        assert!(is_safe_stored_name(&name));
    }

    #[tokio::test]
    async fn test_duplicate_detection() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF same");
        let submission = submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();
        let existing = &submission.files[0];

        let again = FileDescriptor {
            original_name: "copy.pdf".to_string(),
            stored_name: generate_stored_name(".pdf"),
            file_path: String::new(),
            file_size: existing.file_size,
            content_type: "application/pdf".to_string(),
            file_hash: existing.file_hash.clone(),
        };
        let response = finish_upload(&f.storage, again).await.unwrap();
        assert_eq!(response.duplicate_of, Some(existing.id));

        let fresh = FileDescriptor {
            file_hash: "0".repeat(64),
            ..response.file
        };
        let response = finish_upload(&f.storage, fresh).await.unwrap();
        assert_eq!(response.duplicate_of, None);
    }
}
