use chrono::{DateTime, Utc};
use serde::Deserialize;
use ts_rs::TS;

use super::entities::TaskStatus;
use crate::models::common::pagination::PaginationQuery;

/// 创建任务请求
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>, // ISO 8601 格式，如 "2026-01-24T12:00:00Z"
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub allowed_formats: Vec<String>,
    pub filename_template: Option<String>,
    /// 缺省时使用配置中的默认值
    pub max_file_size: Option<i64>,
    /// 提供时整体替换任务的学生名单
    pub student_ids: Option<Vec<i64>>,
}

/// 更新任务请求
///
/// 字段缺省表示不修改；显式给出空字符串或空列表表示清空。
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub allowed_formats: Option<Vec<String>>,
    pub filename_template: Option<String>,
    pub max_file_size: Option<i64>,
    pub student_ids: Option<Vec<i64>>,
}

/// 替换学生名单请求
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub struct AssignStudentsRequest {
    pub student_ids: Vec<i64>,
}

/// 任务列表查询参数（HTTP 请求）
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub struct TaskListParams {
    #[serde(flatten)]
    #[ts(flatten)]
    pub pagination: PaginationQuery,
    /// 按有效状态过滤
    pub status: Option<TaskStatus>,
}

// 用于存储层的内部查询参数
#[derive(Debug, Clone)]
pub struct TaskListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub status: Option<TaskStatus>,
    /// 推导 active/expired 的参考时刻
    pub now: DateTime<Utc>,
}

impl TaskListQuery {
    pub fn from_params(params: &TaskListParams, now: DateTime<Utc>) -> Self {
        Self {
            page: Some(params.pagination.page),
            size: Some(params.pagination.size),
            status: params.status,
            now,
        }
    }
}

/// 写入存储层的任务字段（已合并、已校验）
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub allowed_formats: Vec<String>,
    pub filename_template: Option<String>,
    pub max_file_size: i64,
}
