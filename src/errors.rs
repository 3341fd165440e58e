//! 统一错误处理模块
//!
//! 使用宏自动生成错误类型，支持错误代码和类型名称。
//! 领域错误（校验、授权、状态、不存在、冲突）由生命周期操作原样返回，
//! 由 `ResponseError` 实现统一翻译为 HTTP 状态码。

use std::fmt;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use crate::models::{ApiResponse, ErrorCode};

/// 定义错误类型的宏
///
/// 自动生成：
/// - enum 定义
/// - code() 方法 - 返回错误代码
/// - error_type() 方法 - 返回错误类型名称
/// - message() 方法 - 返回错误详情
/// - 便捷构造函数
macro_rules! define_taskdrop_errors {
    ($(
        $variant:ident($code:literal, $type_name:literal)
    ),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum TaskDropError {
            $($variant(String),)*
        }

        impl TaskDropError {
            /// 获取错误代码
            pub fn code(&self) -> &'static str {
                match self {
                    $(TaskDropError::$variant(_) => $code,)*
                }
            }

            /// 获取错误类型名称
            pub fn error_type(&self) -> &'static str {
                match self {
                    $(TaskDropError::$variant(_) => $type_name,)*
                }
            }

            /// 获取错误详情
            pub fn message(&self) -> &str {
                match self {
                    $(TaskDropError::$variant(msg) => msg,)*
                }
            }
        }

        // 生成便捷构造函数
        paste::paste! {
            impl TaskDropError {
                $(
                    pub fn [<$variant:snake>]<T: Into<String>>(msg: T) -> Self {
                        TaskDropError::$variant(msg.into())
                    }
                )*
            }
        }
    };
}

define_taskdrop_errors! {
    CacheConnection("E001", "Cache Connection Error"),
    CachePluginNotFound("E002", "Cache Plugin Not Found"),
    DatabaseConfig("E003", "Database Configuration Error"),
    DatabaseConnection("E004", "Database Connection Error"),
    DatabaseOperation("E005", "Database Operation Error"),
    FileOperation("E006", "File Operation Error"),
    Validation("E007", "Validation Error"),
    NotFound("E008", "Resource Not Found"),
    Serialization("E009", "Serialization Error"),
    Storage("E010", "Storage Error"),
    State("E011", "State Error"),
    Authentication("E012", "Authentication Error"),
    Authorization("E013", "Authorization Error"),
    Conflict("E014", "Conflict Error"),
}

impl TaskDropError {
    /// 格式化为彩色输出（用于开发环境）
    #[cfg(debug_assertions)]
    pub fn format_colored(&self) -> String {
        format!(
            "\x1b[1;31m[ERROR]\x1b[0m \x1b[33m{}\x1b[0m \x1b[31m{}\x1b[0m\n  {}",
            self.code(),
            self.error_type(),
            self.message()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }

    /// 对应的业务错误码
    pub fn error_code(&self) -> ErrorCode {
        match self {
            TaskDropError::Validation(_) => ErrorCode::BadRequest,
            TaskDropError::Authentication(_) => ErrorCode::AuthFailed,
            TaskDropError::Authorization(_) => ErrorCode::Forbidden,
            TaskDropError::NotFound(_) => ErrorCode::NotFound,
            TaskDropError::State(_) => ErrorCode::InvalidState,
            TaskDropError::Conflict(_) => ErrorCode::Conflict,
            TaskDropError::FileOperation(_) => ErrorCode::FileOperationFailed,
            _ => ErrorCode::InternalServerError,
        }
    }

    /// 是否为存储层（数据库、文件、缓存）故障
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            TaskDropError::CacheConnection(_)
                | TaskDropError::CachePluginNotFound(_)
                | TaskDropError::DatabaseConfig(_)
                | TaskDropError::DatabaseConnection(_)
                | TaskDropError::DatabaseOperation(_)
                | TaskDropError::FileOperation(_)
                | TaskDropError::Serialization(_)
                | TaskDropError::Storage(_)
        )
    }
}

impl fmt::Display for TaskDropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for TaskDropError {}

impl ResponseError for TaskDropError {
    fn status_code(&self) -> StatusCode {
        match self {
            TaskDropError::Validation(_) => StatusCode::BAD_REQUEST,
            TaskDropError::Authentication(_) => StatusCode::UNAUTHORIZED,
            TaskDropError::Authorization(_) => StatusCode::FORBIDDEN,
            TaskDropError::NotFound(_) => StatusCode::NOT_FOUND,
            TaskDropError::State(_) | TaskDropError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_storage_failure() {
            tracing::error!("{}", self);
        }
        HttpResponse::build(self.status_code())
            .json(ApiResponse::error_empty(self.error_code(), self.message()))
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for TaskDropError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                TaskDropError::Conflict(detail)
            }
            _ => TaskDropError::DatabaseOperation(err.to_string()),
        }
    }
}

impl From<std::io::Error> for TaskDropError {
    fn from(err: std::io::Error) -> Self {
        TaskDropError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for TaskDropError {
    fn from(err: serde_json::Error) -> Self {
        TaskDropError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskDropError>;
