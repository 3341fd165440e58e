use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::SubmissionService;
use crate::config::AppConfig;
use crate::errors::{Result, TaskDropError};
use crate::models::files::FileDescriptor;
use crate::models::submissions::{Submission, lifecycle, requests::SubmitRequest};
use crate::models::users::entities::User;
use crate::services::files::sha256_hex;
use crate::services::tasks::{load_task, stats::invalidate_statistics};
use crate::services::{current_user, respond};
use crate::storage::Storage;
use crate::utils::content_type_for;
use crate::utils::validate::is_safe_stored_name;

/// 同一 (任务, 学生) 的提交串行执行
static SUBMIT_LOCKS: Lazy<DashMap<(i64, i64), Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

fn pair_lock(task_id: i64, student_id: i64) -> Arc<Mutex<()>> {
    Arc::clone(&SUBMIT_LOCKS.entry((task_id, student_id)).or_default())
}

fn release_pair_lock(task_id: i64, student_id: i64) {
    // 只剩 map 自己持有时才移除
    SUBMIT_LOCKS.remove_if(&(task_id, student_id), |_, lock| {
        Arc::strong_count(lock) == 1
    });
}

/// 按 stored_name 在上传目录下重新定位文件
///
/// 路径、大小、类型和哈希都以磁盘上的文件为准，客户端传入的值被忽略。
fn resolve_file(upload_dir: &Path, mut file: FileDescriptor) -> Result<FileDescriptor> {
    if !is_safe_stored_name(&file.stored_name) {
        return Err(TaskDropError::validation(format!(
            "无效的存储文件名 '{}'",
            file.stored_name
        )));
    }

    let path = upload_dir.join(&file.stored_name);
    let metadata = std::fs::metadata(&path).map_err(|_| {
        TaskDropError::validation(format!(
            "上传的文件 '{}' 不存在",
            file.stored_name
        ))
    })?;
    if !metadata.is_file() {
        return Err(TaskDropError::validation(format!(
            "上传的文件 '{}' 不存在",
            file.stored_name
        )));
    }

    // 扩展名以上传时生成的存储名为准，原始文件名不能改写
    let stored_ext = Path::new(&file.stored_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()));
    if file.original_name.trim().is_empty() {
        file.original_name = file.stored_name.clone();
    } else if file.extension() != stored_ext {
        return Err(TaskDropError::validation(format!(
            "文件 '{}' 的扩展名与上传时不一致",
            file.original_name
        )));
    }

    file.file_size = metadata.len() as i64;
    file.file_path = path.to_string_lossy().into_owned();
    file.content_type = stored_ext
        .as_deref()
        .map(content_type_for)
        .unwrap_or("application/octet-stream")
        .to_string();
    file.file_hash = sha256_hex(&std::fs::read(&path)?);
    Ok(file)
}

/// 学生提交：检查任务状态、文件和截止规则，然后在一个事务中写入
pub async fn submit(
    storage: &Arc<dyn Storage>,
    student: &User,
    task_id: i64,
    files: Vec<FileDescriptor>,
    upload_dir: &Path,
    now: DateTime<Utc>,
) -> Result<Submission> {
    if !student.is_student() {
        return Err(TaskDropError::authorization("只有学生可以提交"));
    }

    let lock = pair_lock(task_id, student.id);
    let result = {
        let _guard = lock.lock().await;
        submit_locked(storage, student, task_id, files, upload_dir, now).await
    };
    drop(lock);
    release_pair_lock(task_id, student.id);

    if result.is_ok() {
        invalidate_statistics(task_id).await;
    }
    result
}

async fn submit_locked(
    storage: &Arc<dyn Storage>,
    student: &User,
    task_id: i64,
    files: Vec<FileDescriptor>,
    upload_dir: &Path,
    now: DateTime<Utc>,
) -> Result<Submission> {
    let task = load_task(storage, task_id).await?;
    if !storage.is_student_assigned(task_id, student.id).await? {
        return Err(TaskDropError::authorization("该任务未分配给您"));
    }
    lifecycle::check_task_open(&task, now)?;

    let files = files
        .into_iter()
        .map(|file| resolve_file(upload_dir, file))
        .collect::<Result<Vec<_>>>()?;

    let existing = storage
        .get_submission_by_task_and_student(task_id, student.id)
        .await?
        .map(|submission| submission.status);
    let outcome = lifecycle::plan_submit(&task, existing, &files, now)?;

    let submission = storage.submit(task_id, student.id, outcome, files).await?;
    tracing::info!(
        "Student {} submitted task {} ({}, {} files)",
        student.id,
        task_id,
        submission.status,
        submission.files.len()
    );
    Ok(submission)
}

pub async fn handle_submit(
    service: &SubmissionService,
    request: &HttpRequest,
    task_id: i64,
    req: SubmitRequest,
) -> ActixResult<HttpResponse> {
    let result = async {
        let student = current_user(request)?;
        let storage = service.get_storage(request)?;
        let upload_dir = Path::new(&AppConfig::get().upload.dir);
        submit(&storage, &student, task_id, req.files, upload_dir, Utc::now()).await
    }
    .await;
    Ok(respond(result, "提交成功"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::submissions::SubmissionStatus;
    use crate::models::tasks::Task;
    use crate::models::users::entities::UserRole;
    use crate::services::tasks::create::{create_task, tests::create_request};
    use crate::services::tasks::status::publish_task;
    use crate::storage::sea_orm_storage::test_support;
    use chrono::Duration;
    use std::path::PathBuf;

    pub(crate) struct Fixture {
        pub storage: Arc<dyn Storage>,
        pub teacher: User,
        pub student: User,
        pub task: Task,
        pub upload_dir: PathBuf,
        pub now: DateTime<Utc>,
    }

    /// 已发布任务，窗口为 now-1h 到 now+1d，限制 .pdf 和 4096 字节
    pub(crate) async fn fixture() -> Fixture {
        let storage = test_support::storage().await;
        let teacher = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let student = test_support::user(&storage, "s1", UserRole::Student).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let now = Utc::now();

        let task = create_task(
            &storage,
            &teacher,
            create_request(now, Some(vec![student.id])),
            4096,
            now,
        )
        .await
        .unwrap();
        let task = publish_task(&storage, &teacher, task.id, now).await.unwrap();

        let upload_dir = std::env::temp_dir().join(format!("taskdrop-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&upload_dir).unwrap();

        Fixture {
            storage,
            teacher,
            student,
            task,
            upload_dir,
            now,
        }
    }

    /// 在上传目录中写入一个文件并返回描述
    pub(crate) fn stored_file(dir: &Path, original_name: &str, bytes: &[u8]) -> FileDescriptor {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let stored_name = format!("1700000000-{}{}", uuid::Uuid::new_v4(), ext);
        std::fs::write(dir.join(&stored_name), bytes).unwrap();
        FileDescriptor {
            original_name: original_name.to_string(),
            stored_name,
            file_path: String::new(),
            file_size: bytes.len() as i64,
            content_type: String::new(),
            file_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn test_on_time_submit() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "essay.pdf", b"%PDF-1.4 body");

        let submission = submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();
        assert_eq!(submission.status, SubmissionStatus::Submitted);
        assert!(submission.is_on_time);
        assert_eq!(submission.files.len(), 1);
        assert_eq!(submission.files[0].content_type, "application/pdf");
        assert_eq!(submission.files[0].file_hash.len(), 64);

        let task = f.storage.get_task_by_id(f.task.id).await.unwrap().unwrap();
        assert_eq!(task.submitted_count, 1);
        assert_eq!(task.on_time_count, 1);
    }

    #[tokio::test]
    async fn test_deadline_boundaries() {
        let f = fixture().await;

        // 恰好在截止时刻提交算按时
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF");
        let at_deadline = submit(
            &f.storage,
            &f.student,
            f.task.id,
            vec![file],
            &f.upload_dir,
            f.task.end_time,
        )
        .await
        .unwrap();
        assert!(at_deadline.is_on_time);
        assert_eq!(at_deadline.status, SubmissionStatus::Submitted);

        // 截止后已提交过的学生不能再提交
        let file = stored_file(&f.upload_dir, "b.pdf", b"%PDF");
        let err = submit(
            &f.storage,
            &f.student,
            f.task.id,
            vec![file],
            &f.upload_dir,
            f.task.end_time + Duration::seconds(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TaskDropError::State(_)));
        assert_eq!(err.message(), "截止后不允许重新提交");
    }

    #[tokio::test]
    async fn test_first_late_submit_is_allowed() {
        let f = fixture().await;
        let file = stored_file(&f.upload_dir, "late.pdf", b"%PDF");

        let late = submit(
            &f.storage,
            &f.student,
            f.task.id,
            vec![file],
            &f.upload_dir,
            f.task.end_time + Duration::seconds(1),
        )
        .await
        .unwrap();
        assert_eq!(late.status, SubmissionStatus::Late);
        assert!(!late.is_on_time);
    }

    #[tokio::test]
    async fn test_resubmission_updates_the_same_row() {
        let f = fixture().await;
        let first = stored_file(&f.upload_dir, "v1.pdf", b"%PDF v1");
        let second = stored_file(&f.upload_dir, "v2.pdf", b"%PDF v2");

        let a = submit(&f.storage, &f.student, f.task.id, vec![first], &f.upload_dir, f.now)
            .await
            .unwrap();
        let b = submit(
            &f.storage,
            &f.student,
            f.task.id,
            vec![second],
            &f.upload_dir,
            f.now + Duration::minutes(1),
        )
        .await
        .unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(b.files.len(), 1);
        assert_eq!(b.files[0].original_name, "v2.pdf");
        assert_eq!(f.storage.count_submissions(f.task.id).await.unwrap().submitted_count, 1);
    }

    #[tokio::test]
    async fn test_file_metadata_comes_from_disk() {
        let f = fixture().await;
        let bytes = b"%PDF-1.4 real body";
        let mut file = stored_file(&f.upload_dir, "essay.pdf", bytes);
        file.file_hash = "deadbeef".to_string();
        file.content_type = "text/html".to_string();
        file.file_size = 1;

        let submission = submit(&f.storage, &f.student, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap();
        let stored = &submission.files[0];
        assert_eq!(stored.file_hash, sha256_hex(bytes));
        assert_eq!(stored.file_hash.len(), 64);
        assert_eq!(stored.content_type, "application/pdf");
        assert_eq!(stored.file_size, bytes.len() as i64);

        // 原始文件名改成允许的扩展名也不行
        let mut renamed = stored_file(&f.upload_dir, "payload.html", b"<script>");
        renamed.original_name = "payload.pdf".to_string();
        let err = submit(&f.storage, &f.student, f.task.id, vec![renamed], &f.upload_dir, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));
    }

    #[tokio::test]
    async fn test_concurrent_submits_produce_one_row() {
        let f = fixture().await;
        let mut handles = Vec::new();
        for i in 0..4 {
            let storage = f.storage.clone();
            let student = f.student.clone();
            let dir = f.upload_dir.clone();
            let file = stored_file(&dir, &format!("c{i}.pdf"), b"%PDF");
            let task_id = f.task.id;
            let now = f.now;
            handles.push(tokio::spawn(async move {
                submit(&storage, &student, task_id, vec![file], &dir, now).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let counts = f.storage.count_submissions(f.task.id).await.unwrap();
        assert_eq!(counts.submitted_count, 1);
    }

    #[tokio::test]
    async fn test_submit_rejections() {
        let f = fixture().await;

        // 未发布的任务
        let draft = create_task(
            &f.storage,
            &f.teacher,
            create_request(f.now, Some(vec![f.student.id])),
            4096,
            f.now,
        )
        .await
        .unwrap();
        let file = stored_file(&f.upload_dir, "a.pdf", b"%PDF");
        let err = submit(&f.storage, &f.student, draft.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::State(_)));

        // 空文件列表
        let err = submit(&f.storage, &f.student, f.task.id, vec![], &f.upload_dir, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));

        // 超出大小限制
        let big = stored_file(&f.upload_dir, "big.pdf", &vec![b'x'; 5000]);
        let err = submit(&f.storage, &f.student, f.task.id, vec![big], &f.upload_dir, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));

        // 不允许的格式
        let txt = stored_file(&f.upload_dir, "notes.txt", b"hi");
        let err = submit(&f.storage, &f.student, f.task.id, vec![txt], &f.upload_dir, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));

        // 路径穿越
        let mut evil = stored_file(&f.upload_dir, "x.pdf", b"%PDF");
        evil.stored_name = "../../etc/passwd".to_string();
        let err = submit(&f.storage, &f.student, f.task.id, vec![evil], &f.upload_dir, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));

        // 开始时间之前
        let early = stored_file(&f.upload_dir, "e.pdf", b"%PDF");
        let err = submit(
            &f.storage,
            &f.student,
            f.task.id,
            vec![early],
            &f.upload_dir,
            f.task.start_time - Duration::seconds(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TaskDropError::State(_)));

        // 未分配的学生
        let other = User {
            id: f.student.id + 100,
            ..f.student.clone()
        };
        let file = stored_file(&f.upload_dir, "o.pdf", b"%PDF");
        let err = submit(&f.storage, &other, f.task.id, vec![file], &f.upload_dir, f.now)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Authorization(_)));

        assert!(
            f.storage
                .get_submission_by_task_and_student(f.task.id, f.student.id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
