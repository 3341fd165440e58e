use serde::Serialize;
use ts_rs::TS;

use super::entities::Task;
use crate::models::common::pagination::PaginationInfo;
use crate::models::users::responses::StudentBrief;

/// 任务详情
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub struct TaskDetailResponse {
    #[serde(flatten)]
    pub task: Task,
    pub students: Vec<StudentBrief>,
}

/// 任务列表响应
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub struct TaskListResponse {
    pub items: Vec<Task>,
    pub pagination: PaginationInfo,
}
