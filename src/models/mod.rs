//! 业务模型
//!
//! 与 `entity` 中的数据库实体分离，API 层和存储层之间传递的都是这里的类型。

pub mod auth;
pub mod common;
pub mod files;
pub mod statistics;
pub mod submissions;
pub mod tasks;
pub mod users;

pub use common::pagination::{PaginatedResponse, PaginationInfo, PaginationQuery};
pub use common::response::ApiResponse;

use serde::Serialize;

/// 业务错误码，随 `ApiResponse.code` 返回
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,

    // 通用错误
    BadRequest = 1000,
    Unauthorized = 1001,
    AuthFailed = 1002,
    Forbidden = 1003,
    NotFound = 1004,
    Conflict = 1005,
    InvalidState = 1006,
    RateLimitExceeded = 1007,

    // 文件相关
    FileUploadFailed = 2001,
    FileTypeNotAllowed = 2002,
    FileSizeExceeded = 2003,
    FileNotFound = 2004,
    MultifileUploadNotAllowed = 2005,

    // 服务端错误
    InternalServerError = 5000,
    FileOperationFailed = 5001,
}

/// 程序启动时间
#[derive(Debug, Clone)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}
