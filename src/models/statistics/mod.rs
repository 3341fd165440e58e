//! 任务提交统计

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// 从存储层统计出的原始计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionCounts {
    /// 任务分配的学生数
    pub total_students: i64,
    /// 状态为 submitted / late / reviewed 的提交数
    pub submitted_count: i64,
    /// is_on_time 为真的提交数
    pub on_time_count: i64,
    /// 状态为 late 的提交数（批阅后不再计入）
    pub late_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/statistics.ts")]
pub struct TaskStatistics {
    pub total_students: i64,
    pub submitted_count: i64,
    pub on_time_count: i64,
    pub late_count: i64,
    /// total_students - submitted_count，不与实际行数核对
    pub pending_count: i64,
    /// 提交率（百分比）
    pub submit_rate: f64,
    /// 按时率（百分比，分母为已提交数）
    pub on_time_rate: f64,
}

fn percentage(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

impl TaskStatistics {
    pub fn from_counts(counts: SubmissionCounts) -> Self {
        Self {
            total_students: counts.total_students,
            submitted_count: counts.submitted_count,
            on_time_count: counts.on_time_count,
            late_count: counts.late_count,
            pending_count: counts.total_students - counts.submitted_count,
            submit_rate: percentage(counts.submitted_count, counts.total_students),
            on_time_rate: percentage(counts.on_time_count, counts.submitted_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominators() {
        let stats = TaskStatistics::from_counts(SubmissionCounts::default());
        assert_eq!(stats.submit_rate, 0.0);
        assert_eq!(stats.on_time_rate, 0.0);
        assert_eq!(stats.pending_count, 0);
    }

    #[test]
    fn test_no_submissions_yet() {
        let stats = TaskStatistics::from_counts(SubmissionCounts {
            total_students: 4,
            ..Default::default()
        });
        assert_eq!(stats.pending_count, 4);
        assert_eq!(stats.submit_rate, 0.0);
        assert_eq!(stats.on_time_rate, 0.0);
    }

    #[test]
    fn test_rates() {
        let stats = TaskStatistics::from_counts(SubmissionCounts {
            total_students: 4,
            submitted_count: 2,
            on_time_count: 1,
            late_count: 1,
        });
        assert_eq!(stats.pending_count, 2);
        assert!((stats.submit_rate - 50.0).abs() < f64::EPSILON);
        assert!((stats.on_time_rate - 50.0).abs() < f64::EPSILON);
    }
}
