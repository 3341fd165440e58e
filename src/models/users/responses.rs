use super::entities::User;
use serde::Serialize;
use ts_rs::TS;

// 任务学生名单中的精简用户信息
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/user.ts")]
pub struct StudentBrief {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub student_no: Option<String>,
    pub class_name: Option<String>,
}

impl From<&User> for StudentBrief {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            student_no: user.profile.student_no.clone(),
            class_name: user.profile.class_name.clone(),
        }
    }
}
