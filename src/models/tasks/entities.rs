use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// 任务状态
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub enum TaskStatus {
    Draft,     // 草稿
    Active,    // 进行中
    Expired,   // 已截止（只在读取时推导，不落库）
    Completed, // 已结束
}

impl TaskStatus {
    pub const DRAFT: &'static str = "draft";
    pub const ACTIVE: &'static str = "active";
    pub const EXPIRED: &'static str = "expired";
    pub const COMPLETED: &'static str = "completed";
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<TaskStatus>().map_err(|_| {
            serde::de::Error::custom(format!(
                "无效的任务状态: '{s}'. 支持的状态: draft, active, expired, completed"
            ))
        })
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Draft => TaskStatus::DRAFT,
            TaskStatus::Active => TaskStatus::ACTIVE,
            TaskStatus::Expired => TaskStatus::EXPIRED,
            TaskStatus::Completed => TaskStatus::COMPLETED,
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            TaskStatus::DRAFT => Ok(TaskStatus::Draft),
            TaskStatus::ACTIVE => Ok(TaskStatus::Active),
            TaskStatus::EXPIRED => Ok(TaskStatus::Expired),
            TaskStatus::COMPLETED => Ok(TaskStatus::Completed),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// 任务
///
/// `status` 是库中保存的状态，对外展示前要经过
/// [`Task::with_effective_status`] 换算成当前时刻的有效状态。
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/task.ts")]
pub struct Task {
    pub id: i64,
    // 创建者（唯一所有者）
    pub teacher_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    // 允许的扩展名，形如 ".pdf"；为空表示不限制
    pub allowed_formats: Vec<String>,
    pub filename_template: Option<String>,
    // 单个文件大小上限（字节）
    pub max_file_size: i64,
    pub total_students: i32,
    pub submitted_count: i32,
    pub on_time_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_owned_by(&self, teacher_id: i64) -> bool {
        self.teacher_id == teacher_id
    }

    /// 当前时刻的有效状态
    pub fn effective_status(&self, now: DateTime<Utc>) -> TaskStatus {
        super::lifecycle::effective_status(self.status, self.end_time, now)
    }

    /// 用有效状态替换存储状态，用于响应
    pub fn with_effective_status(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        for status in [
            TaskStatus::Draft,
            TaskStatus::Active,
            TaskStatus::Expired,
            TaskStatus::Completed,
        ] {
            assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
        }
        assert!("paused".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_deserialize() {
        let status: TaskStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(status, TaskStatus::Expired);
        assert!(serde_json::from_str::<TaskStatus>("\"archived\"").is_err());
    }
}
