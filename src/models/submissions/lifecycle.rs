//! 提交生命周期规则
//!
//! 状态流转：`pending → {submitted | late} → reviewed`，再次批阅覆盖原结果。
//! 截止时刻当天提交视为按时（`now <= end_time`）。

use chrono::{DateTime, Utc};

use super::entities::{Submission, SubmissionStatus};
use super::requests::ReviewRequest;
use crate::errors::{Result, TaskDropError};
use crate::models::files::FileDescriptor;
use crate::models::tasks::{Task, TaskStatus};
use crate::models::users::entities::{User, UserRole};

/// 一次提交的计算结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmitOutcome {
    pub status: SubmissionStatus,
    pub is_on_time: bool,
    pub submitted_at: DateTime<Utc>,
}

/// 由提交时刻与截止时间得出状态
pub fn submission_outcome(end_time: DateTime<Utc>, now: DateTime<Utc>) -> SubmitOutcome {
    let is_on_time = now <= end_time;
    SubmitOutcome {
        status: if is_on_time {
            SubmissionStatus::Submitted
        } else {
            SubmissionStatus::Late
        },
        is_on_time,
        submitted_at: now,
    }
}

/// 任务是否开放提交（看存储状态，截止后的首次提交仍然允许）
pub fn check_task_open(task: &Task, now: DateTime<Utc>) -> Result<()> {
    if task.status != TaskStatus::Active {
        return Err(TaskDropError::state("任务未处于进行中，不能提交"));
    }
    if now < task.start_time {
        return Err(TaskDropError::state("任务尚未开始"));
    }
    Ok(())
}

fn format_allowed(task: &Task, file: &FileDescriptor) -> bool {
    if task.allowed_formats.is_empty() {
        return true;
    }
    match file.extension() {
        Some(ext) => task.allowed_formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// 校验提交的文件列表
pub fn validate_files(task: &Task, files: &[FileDescriptor]) -> Result<()> {
    if files.is_empty() {
        return Err(TaskDropError::validation("至少需要提交一个文件"));
    }
    for file in files {
        if file.stored_name.trim().is_empty() {
            return Err(TaskDropError::validation("stored_name 不能为空"));
        }
        if file.file_size < 0 {
            return Err(TaskDropError::validation(format!(
                "文件 '{}' 大小无效",
                file.original_name
            )));
        }
        if file.file_size > task.max_file_size {
            return Err(TaskDropError::validation(format!(
                "文件 '{}' 超过大小限制 {} 字节",
                file.original_name, task.max_file_size
            )));
        }
        if !format_allowed(task, file) {
            return Err(TaskDropError::validation(format!(
                "文件 '{}' 格式不被允许（允许: {}）",
                file.original_name,
                task.allowed_formats.join(", ")
            )));
        }
    }
    Ok(())
}

/// 已经提交过的学生在截止后不能再次提交
pub fn check_resubmission(
    existing: Option<SubmissionStatus>,
    end_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    match existing {
        Some(status) if status != SubmissionStatus::Pending && now > end_time => Err(
            TaskDropError::state("截止后不允许重新提交"),
        ),
        _ => Ok(()),
    }
}

/// 按顺序执行提交前的全部检查，返回本次提交的结果
pub fn plan_submit(
    task: &Task,
    existing: Option<SubmissionStatus>,
    files: &[FileDescriptor],
    now: DateTime<Utc>,
) -> Result<SubmitOutcome> {
    check_task_open(task, now)?;
    validate_files(task, files)?;
    check_resubmission(existing, task.end_time, now)?;
    Ok(submission_outcome(task.end_time, now))
}

/// 只有任务所有者可以批阅
pub fn check_review(task: &Task, teacher_id: i64, req: &ReviewRequest) -> Result<()> {
    if !task.is_owned_by(teacher_id) {
        return Err(TaskDropError::authorization(
            "只有任务创建者可以批阅提交",
        ));
    }
    if let Some(score) = req.score
        && (!score.is_finite() || score < 0.0)
    {
        return Err(TaskDropError::validation(
            "分数必须是非负数",
        ));
    }
    Ok(())
}

/// 学生只能看自己的提交，教师只能看自己任务下的提交
pub fn check_view(user: &User, submission: &Submission, task: &Task) -> Result<()> {
    let allowed = match user.role {
        UserRole::Student => submission.student_id == user.id,
        UserRole::Teacher => task.is_owned_by(user.id),
    };
    if !allowed {
        return Err(TaskDropError::authorization(
            "无权查看该提交",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tasks::lifecycle::tests::sample_task;
    use chrono::Duration;

    fn file(name: &str, size: i64) -> FileDescriptor {
        FileDescriptor {
            original_name: name.to_string(),
            stored_name: format!("1700000000-{name}"),
            file_path: String::new(),
            file_size: size,
            content_type: "application/pdf".to_string(),
            file_hash: String::new(),
        }
    }

    #[test]
    fn test_on_time_at_exact_deadline() {
        let end = Utc::now();
        let outcome = submission_outcome(end, end);
        assert!(outcome.is_on_time);
        assert_eq!(outcome.status, SubmissionStatus::Submitted);

        let outcome = submission_outcome(end, end + Duration::seconds(1));
        assert!(!outcome.is_on_time);
        assert_eq!(outcome.status, SubmissionStatus::Late);
    }

    #[test]
    fn test_plan_submit_on_time() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Active, now);
        let outcome = plan_submit(&task, None, &[file("a.pdf", 500)], now).unwrap();
        assert_eq!(outcome.status, SubmissionStatus::Submitted);
        assert_eq!(outcome.submitted_at, now);
    }

    #[test]
    fn test_first_late_submission_allowed() {
        let now = Utc::now();
        let mut task = sample_task(TaskStatus::Active, now);
        task.start_time = now - Duration::days(3);
        task.end_time = now - Duration::days(1);
        let outcome = plan_submit(
            &task,
            Some(SubmissionStatus::Pending),
            &[file("a.pdf", 10)],
            now,
        )
        .unwrap();
        assert_eq!(outcome.status, SubmissionStatus::Late);
        assert!(!outcome.is_on_time);
    }

    #[test]
    fn test_late_resubmission_rejected() {
        let now = Utc::now();
        let mut task = sample_task(TaskStatus::Active, now);
        task.end_time = now - Duration::seconds(1);
        for status in SubmissionStatus::submitted_states() {
            let err = plan_submit(&task, Some(*status), &[file("a.pdf", 10)], now).unwrap_err();
            assert!(matches!(err, TaskDropError::State(_)));
        }
    }

    #[test]
    fn test_resubmission_before_deadline_allowed() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Active, now);
        assert!(
            plan_submit(
                &task,
                Some(SubmissionStatus::Reviewed),
                &[file("a.pdf", 10)],
                now
            )
            .is_ok()
        );
    }

    #[test]
    fn test_task_must_be_active_and_started() {
        let now = Utc::now();
        let draft = sample_task(TaskStatus::Draft, now);
        assert!(matches!(
            plan_submit(&draft, None, &[file("a.pdf", 1)], now).unwrap_err(),
            TaskDropError::State(_)
        ));

        let mut future = sample_task(TaskStatus::Active, now);
        future.start_time = now + Duration::hours(1);
        future.end_time = now + Duration::hours(2);
        assert!(matches!(
            plan_submit(&future, None, &[file("a.pdf", 1)], now).unwrap_err(),
            TaskDropError::State(_)
        ));
    }

    #[test]
    fn test_file_validation() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Active, now);
        let cases = [
            vec![],
            vec![file("big.pdf", 1001)],
            vec![file("notes.txt", 10)],
            vec![file("noext", 10)],
        ];
        for files in cases {
            let err = plan_submit(&task, None, &files, now).unwrap_err();
            assert!(matches!(err, TaskDropError::Validation(_)), "{files:?}");
        }
        assert!(plan_submit(&task, None, &[file("REPORT.PDF", 1000)], now).is_ok());
    }

    #[test]
    fn test_empty_format_list_allows_anything() {
        let now = Utc::now();
        let mut task = sample_task(TaskStatus::Active, now);
        task.allowed_formats.clear();
        assert!(validate_files(&task, &[file("data.bin", 1)]).is_ok());
    }

    #[test]
    fn test_review_requires_owner() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Active, now);
        let req = ReviewRequest {
            score: Some(90.0),
            comment: None,
        };
        assert!(check_review(&task, 10, &req).is_ok());
        assert!(matches!(
            check_review(&task, 11, &req).unwrap_err(),
            TaskDropError::Authorization(_)
        ));
        let bad = ReviewRequest {
            score: Some(f64::NAN),
            comment: None,
        };
        assert!(matches!(
            check_review(&task, 10, &bad).unwrap_err(),
            TaskDropError::Validation(_)
        ));
    }
}
