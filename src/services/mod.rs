//! 业务服务层
//!
//! 每个操作都拆成两部分：接收 `&Arc<dyn Storage>`、当前用户和 `now` 的核心函数，
//! 返回 `errors::Result`；以及把结果包装成 `ApiResponse` 的 HTTP 处理函数。

pub mod auth;
pub mod files;
pub mod submissions;
pub mod tasks;
pub mod users;

pub use auth::AuthService;
pub use files::FileService;
pub use submissions::SubmissionService;
pub use tasks::TaskService;
pub use users::UserService;

use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use serde::Serialize;
use std::sync::Arc;
use ts_rs::TS;

use crate::errors::{Result, TaskDropError};
use crate::middlewares::RequireJWT;
use crate::models::ApiResponse;
use crate::models::users::entities::User;
use crate::storage::Storage;

// 从 app data 中取出存储实例
pub(crate) fn storage_from_request(request: &HttpRequest) -> Result<Arc<dyn Storage>> {
    request
        .app_data::<web::Data<Arc<dyn Storage>>>()
        .map(|data| data.get_ref().clone())
        .ok_or_else(|| TaskDropError::storage("Storage not found in app data"))
}

// 当前登录用户，由 RequireJWT 写入
pub(crate) fn current_user(request: &HttpRequest) -> Result<User> {
    RequireJWT::extract_user_claims(request)
        .ok_or_else(|| TaskDropError::authentication("无法获取用户信息"))
}

/// 把核心函数的结果转换为统一响应
pub(crate) fn respond<T: Serialize + TS>(result: Result<T>, message: &str) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(ApiResponse::success(data, message)),
        Err(e) => e.error_response(),
    }
}

pub(crate) fn respond_created<T: Serialize + TS>(result: Result<T>, message: &str) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Created().json(ApiResponse::success(data, message)),
        Err(e) => e.error_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_respond_maps_errors() {
        let ok = respond(Ok(1), "ok");
        assert_eq!(ok.status(), StatusCode::OK);

        let state: Result<i32> = Err(TaskDropError::state("not draft"));
        assert_eq!(respond(state, "ok").status(), StatusCode::CONFLICT);

        let forbidden: Result<i32> = Err(TaskDropError::authorization("owner only"));
        assert_eq!(respond(forbidden, "ok").status(), StatusCode::FORBIDDEN);

        let created = respond_created(Ok("x"), "created");
        assert_eq!(created.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_missing_user_is_authentication_error() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        let err = current_user(&req).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert!(storage_from_request(&req).is_err());
    }
}
