use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{
    files::{File, FileDescriptor, FileStatistics},
    statistics::SubmissionCounts,
    submissions::{
        Submission,
        lifecycle::SubmitOutcome,
        requests::{ReviewRequest, SubmissionListQuery},
        responses::{StudentSubmissionStatus, SubmissionListResponse},
    },
    tasks::{
        Task, TaskStatus,
        requests::{TaskFields, TaskListQuery},
        responses::TaskListResponse,
    },
    users::{
        entities::User,
        requests::{CreateUserRequest, UpdateProfileRequest},
    },
};

use crate::errors::Result;

pub mod sea_orm_storage;

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// 用户管理方法
    // 创建用户
    async fn create_user(&self, user: CreateUserRequest) -> Result<User>;
    // 通过ID获取用户信息
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>>;
    // 通过用户名获取用户信息
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    // 通过外部账号 ID 获取用户信息
    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>>;
    // 绑定外部账号，已被其他用户绑定时返回 Conflict
    async fn bind_external_id(&self, user_id: i64, external_id: &str) -> Result<User>;
    // 更新个人资料
    async fn update_profile(&self, user_id: i64, update: UpdateProfileRequest)
    -> Result<Option<User>>;
    // 用户总数
    async fn count_users(&self) -> Result<u64>;

    /// 任务管理方法
    // 创建草稿任务，提供学生名单时在同一事务内写入
    async fn create_task(
        &self,
        teacher_id: i64,
        fields: TaskFields,
        student_ids: Option<Vec<i64>>,
    ) -> Result<Task>;
    // 通过ID获取任务（不含已删除）
    async fn get_task_by_id(&self, id: i64) -> Result<Option<Task>>;
    // 覆盖任务字段，提供学生名单时一并替换
    async fn update_task(
        &self,
        task_id: i64,
        fields: TaskFields,
        student_ids: Option<Vec<i64>>,
    ) -> Result<Task>;
    // 条件状态迁移：存储状态必须仍为 from
    async fn transition_task_status(
        &self,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<()>;
    // 软删除，now 时刻仍进行中的任务会被拒绝
    async fn soft_delete_task(&self, task_id: i64, now: i64) -> Result<()>;
    // 整体替换学生名单并更新计数
    async fn assign_students(&self, task_id: i64, student_ids: Vec<i64>) -> Result<Task>;
    // 教师自己的任务
    async fn list_teacher_tasks(
        &self,
        teacher_id: i64,
        query: TaskListQuery,
    ) -> Result<TaskListResponse>;
    // 分配给学生的任务（不含草稿）
    async fn list_student_tasks(
        &self,
        student_id: i64,
        query: TaskListQuery,
    ) -> Result<TaskListResponse>;
    // 任务的学生名单
    async fn get_task_students(&self, task_id: i64) -> Result<Vec<User>>;
    // 学生是否在任务名单中
    async fn is_student_assigned(&self, task_id: i64, student_id: i64) -> Result<bool>;

    /// 提交管理方法
    async fn get_submission_by_id(&self, id: i64) -> Result<Option<Submission>>;
    async fn get_submission_by_task_and_student(
        &self,
        task_id: i64,
        student_id: i64,
    ) -> Result<Option<Submission>>;
    // 写入一次提交：找到或创建记录、替换文件、更新状态和任务计数，单个事务
    async fn submit(
        &self,
        task_id: i64,
        student_id: i64,
        outcome: SubmitOutcome,
        files: Vec<FileDescriptor>,
    ) -> Result<Submission>;
    // 写入批阅结果，覆盖之前的批阅
    async fn review_submission(
        &self,
        submission_id: i64,
        teacher_id: i64,
        review: ReviewRequest,
        now: DateTime<Utc>,
    ) -> Result<Submission>;
    async fn list_submissions_by_task(
        &self,
        task_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse>;
    async fn list_submissions_by_student(
        &self,
        student_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse>;
    // 统计计数
    async fn count_submissions(&self, task_id: i64) -> Result<SubmissionCounts>;
    // 名单中每个学生及其提交
    async fn list_task_students_status(&self, task_id: i64)
    -> Result<Vec<StudentSubmissionStatus>>;

    /// 文件管理方法
    async fn get_file_by_id(&self, id: i64) -> Result<Option<File>>;
    // 按内容哈希查找未删除的文件
    async fn find_file_by_hash(&self, hash: &str) -> Result<Option<File>>;
    async fn get_file_statistics(&self, task_id: i64) -> Result<FileStatistics>;
}

pub async fn create_storage() -> Result<Arc<dyn Storage>> {
    let storage = sea_orm_storage::SeaOrmStorage::new_async().await?;
    Ok(Arc::new(storage))
}
