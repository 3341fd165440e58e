use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::files::File;

// 提交状态
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub enum SubmissionStatus {
    Pending,   // 未提交
    Submitted, // 已提交
    Late,      // 迟交
    Reviewed,  // 已批阅
}

impl SubmissionStatus {
    pub const PENDING: &'static str = "pending";
    pub const SUBMITTED: &'static str = "submitted";
    pub const LATE: &'static str = "late";
    pub const REVIEWED: &'static str = "reviewed";

    /// 计入"已提交"的状态
    pub fn submitted_states() -> &'static [SubmissionStatus] {
        &[
            SubmissionStatus::Submitted,
            SubmissionStatus::Late,
            SubmissionStatus::Reviewed,
        ]
    }

    pub fn has_submitted(&self) -> bool {
        Self::submitted_states().contains(self)
    }
}

impl<'de> Deserialize<'de> for SubmissionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<SubmissionStatus>().map_err(|_| {
            serde::de::Error::custom(format!(
                "无效的提交状态: '{s}'. 支持的状态: pending, submitted, late, reviewed"
            ))
        })
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubmissionStatus::Pending => SubmissionStatus::PENDING,
            SubmissionStatus::Submitted => SubmissionStatus::SUBMITTED,
            SubmissionStatus::Late => SubmissionStatus::LATE,
            SubmissionStatus::Reviewed => SubmissionStatus::REVIEWED,
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            SubmissionStatus::PENDING => Ok(SubmissionStatus::Pending),
            SubmissionStatus::SUBMITTED => Ok(SubmissionStatus::Submitted),
            SubmissionStatus::LATE => Ok(SubmissionStatus::Late),
            SubmissionStatus::REVIEWED => Ok(SubmissionStatus::Reviewed),
            _ => Err(format!("Invalid submission status: {s}")),
        }
    }
}

/// 提交记录，每个 (task_id, student_id) 至多一条
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/submission.ts")]
pub struct Submission {
    pub id: i64,
    pub task_id: i64,
    pub student_id: i64,
    pub status: SubmissionStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub is_on_time: bool,
    // 当前有效的文件，按上传顺序
    pub files: Vec<File>,
    pub score: Option<f64>,
    pub comment: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_states() {
        assert!(!SubmissionStatus::Pending.has_submitted());
        assert!(SubmissionStatus::Submitted.has_submitted());
        assert!(SubmissionStatus::Late.has_submitted());
        assert!(SubmissionStatus::Reviewed.has_submitted());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("late".parse::<SubmissionStatus>(), Ok(SubmissionStatus::Late));
        assert_eq!(SubmissionStatus::Reviewed.to_string(), "reviewed");
        assert!("graded".parse::<SubmissionStatus>().is_err());
    }
}
