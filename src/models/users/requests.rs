use super::entities::{UserProfile, UserRole};
use serde::Deserialize;
use ts_rs::TS;

// 用户创建请求（用于初始化数据和存储层）
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub username: String,
    /// 已经哈希过的密码
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub profile: UserProfile,
}

// 当前用户资料更新请求，缺省字段保持不变
#[derive(Debug, Default, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/user.ts")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.department.is_none()
    }
}

// 绑定外部账号请求
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/user.ts")]
pub struct BindExternalRequest {
    pub code: String,
}
