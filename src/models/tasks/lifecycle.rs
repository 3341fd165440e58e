//! 任务生命周期规则
//!
//! 纯函数，不访问存储。当前时刻由调用方传入，便于测试。
//!
//! 状态机：`draft → active → {expired | completed}`。
//! `expired` 不落库，由 `active` 与截止时间在读取时推导；
//! `completed` 只能由教师显式结束任务得到。

use chrono::{DateTime, Utc};

use super::entities::{Task, TaskStatus};
use super::requests::{CreateTaskRequest, TaskFields, UpdateTaskRequest};
use crate::errors::{Result, TaskDropError};

/// 由存储状态与截止时间推导有效状态
pub fn effective_status(
    stored: TaskStatus,
    end_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> TaskStatus {
    match stored {
        TaskStatus::Active if now > end_time => TaskStatus::Expired,
        other => other,
    }
}

pub fn validate_time_window(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<()> {
    if end_time < start_time {
        return Err(TaskDropError::validation(
            "截止时间不能早于开始时间",
        ));
    }
    Ok(())
}

pub fn ensure_owner(task: &Task, teacher_id: i64) -> Result<()> {
    if !task.is_owned_by(teacher_id) {
        return Err(TaskDropError::authorization(
            "只有任务创建者可以执行该操作",
        ));
    }
    Ok(())
}

/// 扩展名统一为小写并带前导点，去重后保持原有顺序
pub fn normalize_formats(formats: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(formats.len());
    for format in formats {
        let trimmed = format.trim().trim_start_matches('.').to_lowercase();
        if trimmed.is_empty() {
            continue;
        }
        let ext = format!(".{trimmed}");
        if !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    normalized
}

/// 学生 ID 去重，保持首次出现的顺序
pub fn dedup_student_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TaskDropError::validation("任务标题不能为空"));
    }
    Ok(title.to_string())
}

fn validate_max_file_size(size: i64) -> Result<i64> {
    if size <= 0 {
        return Err(TaskDropError::validation("max_file_size 必须为正数"));
    }
    Ok(size)
}

/// 校验创建请求并生成待写入的字段
pub fn prepare_create(req: &CreateTaskRequest, default_max_file_size: i64) -> Result<TaskFields> {
    validate_time_window(req.start_time, req.end_time)?;
    let max_file_size = match req.max_file_size {
        None | Some(0) => default_max_file_size,
        Some(size) => validate_max_file_size(size)?,
    };
    Ok(TaskFields {
        title: validate_title(&req.title)?,
        description: req.description.clone(),
        start_time: req.start_time,
        end_time: req.end_time,
        allowed_formats: normalize_formats(&req.allowed_formats),
        filename_template: req.filename_template.clone(),
        max_file_size,
    })
}

/// 检查更新权限并把补丁合并到当前字段上
///
/// 缺省字段保持不变；空字符串会把可选文本清空。合并后重新校验时间窗口。
pub fn apply_update(task: &Task, teacher_id: i64, patch: &UpdateTaskRequest) -> Result<TaskFields> {
    ensure_owner(task, teacher_id)?;
    if task.status == TaskStatus::Completed {
        return Err(TaskDropError::state("已结束的任务不能修改"));
    }

    let fields = TaskFields {
        title: match &patch.title {
            Some(title) => validate_title(title)?,
            None => task.title.clone(),
        },
        description: match &patch.description {
            Some(d) if d.is_empty() => None,
            Some(d) => Some(d.clone()),
            None => task.description.clone(),
        },
        start_time: patch.start_time.unwrap_or(task.start_time),
        end_time: patch.end_time.unwrap_or(task.end_time),
        allowed_formats: match &patch.allowed_formats {
            Some(formats) => normalize_formats(formats),
            None => task.allowed_formats.clone(),
        },
        filename_template: match &patch.filename_template {
            Some(t) if t.is_empty() => None,
            Some(t) => Some(t.clone()),
            None => task.filename_template.clone(),
        },
        max_file_size: match patch.max_file_size {
            Some(size) => validate_max_file_size(size)?,
            None => task.max_file_size,
        },
    };
    validate_time_window(fields.start_time, fields.end_time)?;
    Ok(fields)
}

/// 发布：只有草稿可以发布
pub fn check_publish(task: &Task, teacher_id: i64) -> Result<()> {
    ensure_owner(task, teacher_id)?;
    if task.status != TaskStatus::Draft {
        return Err(TaskDropError::state(format!(
            "只有草稿任务可以发布（当前状态: {}）",
            task.status
        )));
    }
    Ok(())
}

/// 删除：进行中的任务不能删除
pub fn check_delete(task: &Task, teacher_id: i64, now: DateTime<Utc>) -> Result<()> {
    ensure_owner(task, teacher_id)?;
    if task.effective_status(now) == TaskStatus::Active {
        return Err(TaskDropError::state("进行中的任务不能删除"));
    }
    Ok(())
}

/// 结束任务：进行中或已截止的任务可以结束
pub fn check_complete(task: &Task, teacher_id: i64, now: DateTime<Utc>) -> Result<()> {
    ensure_owner(task, teacher_id)?;
    match task.effective_status(now) {
        TaskStatus::Active | TaskStatus::Expired => Ok(()),
        status => Err(TaskDropError::state(format!(
            "只有进行中或已截止的任务可以结束（当前状态: {status}）"
        ))),
    }
}

/// 修改学生名单同样要求任务未结束
pub fn check_assign(task: &Task, teacher_id: i64) -> Result<()> {
    ensure_owner(task, teacher_id)?;
    if task.status == TaskStatus::Completed {
        return Err(TaskDropError::state(
            "已结束任务的学生名单不能修改",
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_task(status: TaskStatus, now: DateTime<Utc>) -> Task {
        Task {
            id: 1,
            teacher_id: 10,
            title: "Lab 1".to_string(),
            description: Some("first lab".to_string()),
            status,
            start_time: now - Duration::days(1),
            end_time: now + Duration::days(1),
            allowed_formats: vec![".pdf".to_string()],
            filename_template: None,
            max_file_size: 1000,
            total_students: 0,
            submitted_count: 0,
            on_time_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn create_request(now: DateTime<Utc>) -> CreateTaskRequest {
        CreateTaskRequest {
            title: " Essay ".to_string(),
            description: None,
            start_time: now,
            end_time: now + Duration::hours(2),
            allowed_formats: vec!["PDF".to_string(), ".docx".to_string(), "pdf".to_string()],
            filename_template: None,
            max_file_size: None,
            student_ids: None,
        }
    }

    #[test]
    fn test_effective_status() {
        let now = Utc::now();
        let end = now;
        assert_eq!(effective_status(TaskStatus::Active, end, now), TaskStatus::Active);
        assert_eq!(
            effective_status(TaskStatus::Active, end, now + Duration::seconds(1)),
            TaskStatus::Expired
        );
        assert_eq!(
            effective_status(TaskStatus::Draft, end, now + Duration::days(3)),
            TaskStatus::Draft
        );
        assert_eq!(
            effective_status(TaskStatus::Completed, end, now + Duration::days(3)),
            TaskStatus::Completed
        );
    }

    #[test]
    fn test_prepare_create_defaults_and_normalizes() {
        let now = Utc::now();
        let fields = prepare_create(&create_request(now), 10_485_760).unwrap();
        assert_eq!(fields.title, "Essay");
        assert_eq!(fields.max_file_size, 10_485_760);
        assert_eq!(fields.allowed_formats, vec![".pdf", ".docx"]);
    }

    #[test]
    fn test_prepare_create_rejects_inverted_window() {
        let now = Utc::now();
        let mut req = create_request(now);
        req.end_time = now - Duration::seconds(1);
        let err = prepare_create(&req, 1).unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));
    }

    #[test]
    fn test_prepare_create_accepts_equal_bounds() {
        let now = Utc::now();
        let mut req = create_request(now);
        req.end_time = now;
        assert!(prepare_create(&req, 1).is_ok());
    }

    #[test]
    fn test_update_requires_owner_before_state() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Completed, now);
        let err = apply_update(&task, 99, &UpdateTaskRequest::default()).unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));
        let err = apply_update(&task, 10, &UpdateTaskRequest::default()).unwrap_err();
        assert!(matches!(err, TaskDropError::State(_)));
    }

    #[test]
    fn test_update_sparse_patch() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Active, now);

        let untouched = apply_update(&task, 10, &UpdateTaskRequest::default()).unwrap();
        assert_eq!(untouched.title, "Lab 1");
        assert_eq!(untouched.description.as_deref(), Some("first lab"));
        assert_eq!(untouched.allowed_formats, vec![".pdf"]);

        let patch = UpdateTaskRequest {
            description: Some(String::new()),
            allowed_formats: Some(vec![]),
            ..Default::default()
        };
        let cleared = apply_update(&task, 10, &patch).unwrap();
        assert_eq!(cleared.description, None);
        assert!(cleared.allowed_formats.is_empty());
        assert_eq!(cleared.title, "Lab 1");
    }

    #[test]
    fn test_update_revalidates_merged_window() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Draft, now);
        let patch = UpdateTaskRequest {
            end_time: Some(task.start_time - Duration::seconds(1)),
            ..Default::default()
        };
        let err = apply_update(&task, 10, &patch).unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));
    }

    #[test]
    fn test_publish_only_from_draft() {
        let now = Utc::now();
        assert!(check_publish(&sample_task(TaskStatus::Draft, now), 10).is_ok());
        for status in [TaskStatus::Active, TaskStatus::Completed] {
            let err = check_publish(&sample_task(status, now), 10).unwrap_err();
            assert!(matches!(err, TaskDropError::State(_)));
        }
        let err = check_publish(&sample_task(TaskStatus::Draft, now), 11).unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));
    }

    #[test]
    fn test_delete_rejects_active_but_allows_expired() {
        let now = Utc::now();
        let task = sample_task(TaskStatus::Active, now);
        assert!(matches!(
            check_delete(&task, 10, now).unwrap_err(),
            TaskDropError::State(_)
        ));
        assert!(check_delete(&task, 10, task.end_time + Duration::seconds(1)).is_ok());
        assert!(check_delete(&sample_task(TaskStatus::Draft, now), 10, now).is_ok());
    }

    #[test]
    fn test_complete_requires_published_task() {
        let now = Utc::now();
        assert!(check_complete(&sample_task(TaskStatus::Active, now), 10, now).is_ok());
        assert!(matches!(
            check_complete(&sample_task(TaskStatus::Draft, now), 10, now).unwrap_err(),
            TaskDropError::State(_)
        ));
        assert!(matches!(
            check_complete(&sample_task(TaskStatus::Completed, now), 10, now).unwrap_err(),
            TaskDropError::State(_)
        ));
    }

    #[test]
    fn test_dedup_student_ids() {
        assert_eq!(dedup_student_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
