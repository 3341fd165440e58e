use serde::Serialize;
use ts_rs::TS;

use super::entities::Submission;
use crate::models::common::pagination::PaginationInfo;
use crate::models::users::responses::StudentBrief;

/// 提交列表响应
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct SubmissionListResponse {
    pub items: Vec<Submission>,
    pub pagination: PaginationInfo,
}

/// 学生名单中的一项：学生以及其提交（如果有）
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct StudentSubmissionStatus {
    pub student: StudentBrief,
    pub has_submission: bool,
    pub submission: Option<Submission>,
}
