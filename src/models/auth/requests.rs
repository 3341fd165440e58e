use serde::Deserialize;
use ts_rs::TS;

// 用户登录请求（来自HTTP请求）
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/auth.ts")]
pub struct LoginRequest {
    /// 用户名（学号或工号）
    pub username: String,
    /// 密码
    pub password: String,
}

// 外部账号登录请求
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/auth.ts")]
pub struct ExternalLoginRequest {
    /// 外部平台下发的临时 code
    pub code: String,
}
