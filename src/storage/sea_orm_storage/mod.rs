//! SeaORM 存储实现
//!
//! 统一的数据库存储层，支持 SQLite、PostgreSQL 和 MySQL。

mod files;
mod submissions;
mod tasks;
mod users;

use crate::config::AppConfig;
use crate::errors::{TaskDropError, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// SeaORM 存储实现
#[derive(Clone)]
pub struct SeaOrmStorage {
    pub(crate) db: DatabaseConnection,
}

impl SeaOrmStorage {
    /// 创建新的 SeaORM 存储实例
    pub async fn new_async() -> Result<Self> {
        let config = AppConfig::get();
        let db_url = Self::build_database_url(&config.database.url)?;

        // 根据数据库类型选择连接方式
        let db = if db_url.starts_with("sqlite://") {
            Self::connect_sqlite(&db_url, config).await?
        } else {
            Self::connect_generic(&db_url, config).await?
        };

        // 运行迁移
        Migrator::up(&db, None)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("数据库迁移失败: {e}")))?;

        info!("SeaORM 存储初始化完成，数据库: {}", db_url);

        Ok(Self { db })
    }

    /// 内存 SQLite，只保留一个连接以免每个连接各自一份库
    pub async fn in_memory() -> Result<Self> {
        use sea_orm::SqlxSqliteConnector;
        use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        let opt = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| TaskDropError::database_config(format!("SQLite URL 解析失败: {e}")))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opt)
            .await
            .map_err(|e| TaskDropError::database_connection(format!("SQLite 连接失败: {e}")))?;
        let db = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);

        Migrator::up(&db, None)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("数据库迁移失败: {e}")))?;
        Ok(Self { db })
    }

    /// SQLite 专用连接（WAL + pragma 优化）
    async fn connect_sqlite(url: &str, config: &AppConfig) -> Result<DatabaseConnection> {
        use sea_orm::SqlxSqliteConnector;
        use sea_orm::sqlx::sqlite::{
            SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
        };
        use std::str::FromStr;

        let opt = SqliteConnectOptions::from_str(url)
            .map_err(|e| TaskDropError::database_config(format!("SQLite URL 解析失败: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .pragma("cache_size", "-64000")
            .pragma("temp_store", "memory")
            .pragma("mmap_size", "536870912")
            .pragma("wal_autocheckpoint", "1000");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.pool_size)
            .min_connections(1)
            .test_before_acquire(true)
            .acquire_timeout(Duration::from_secs(config.database.timeout))
            .idle_timeout(Duration::from_secs(300))
            .connect_with(opt)
            .await
            .map_err(|e| TaskDropError::database_connection(format!("SQLite 连接失败: {e}")))?;

        Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
    }

    /// 通用连接（PostgreSQL、MySQL 等）
    async fn connect_generic(url: &str, config: &AppConfig) -> Result<DatabaseConnection> {
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(config.database.pool_size)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(config.database.timeout))
            .acquire_timeout(Duration::from_secs(config.database.timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging(false)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        Database::connect(opt)
            .await
            .map_err(|e| TaskDropError::database_connection(format!("无法连接到数据库: {e}")))
    }

    /// 从 URL 自动推断数据库类型并构建连接 URL
    fn build_database_url(url: &str) -> Result<String> {
        if url.starts_with("sqlite://") {
            Ok(url.to_string())
        } else if url.ends_with(".db") || url.ends_with(".sqlite") || url == ":memory:" {
            Ok(format!("sqlite://{}?mode=rwc", url))
        } else if url.starts_with("postgres://")
            || url.starts_with("postgresql://")
            || url.starts_with("mysql://")
            || url.starts_with("mariadb://")
        {
            Ok(url.to_string())
        } else {
            Err(TaskDropError::database_config(format!(
                "无法从 URL 推断数据库类型: {url}. 支持: sqlite://, postgres://, mysql://, 或 .db/.sqlite 文件路径"
            )))
        }
    }
}

// Storage trait 实现
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
use crate::storage::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
impl Storage for SeaOrmStorage {
    // 用户模块
    async fn create_user(&self, user: CreateUserRequest) -> Result<User> {
        self.create_user_impl(user).await
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.get_user_by_id_impl(id).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.get_user_by_username_impl(username).await
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        self.get_user_by_external_id_impl(external_id).await
    }

    async fn bind_external_id(&self, user_id: i64, external_id: &str) -> Result<User> {
        self.bind_external_id_impl(user_id, external_id).await
    }

    async fn update_profile(
        &self,
        user_id: i64,
        update: UpdateProfileRequest,
    ) -> Result<Option<User>> {
        self.update_profile_impl(user_id, update).await
    }

    async fn count_users(&self) -> Result<u64> {
        self.count_users_impl().await
    }

    // 任务模块
    async fn create_task(
        &self,
        teacher_id: i64,
        fields: TaskFields,
        student_ids: Option<Vec<i64>>,
    ) -> Result<Task> {
        self.create_task_impl(teacher_id, fields, student_ids).await
    }

    async fn get_task_by_id(&self, id: i64) -> Result<Option<Task>> {
        self.get_task_by_id_impl(id).await
    }

    async fn update_task(
        &self,
        task_id: i64,
        fields: TaskFields,
        student_ids: Option<Vec<i64>>,
    ) -> Result<Task> {
        self.update_task_impl(task_id, fields, student_ids).await
    }

    async fn transition_task_status(
        &self,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<()> {
        self.transition_task_status_impl(task_id, from, to).await
    }

    async fn soft_delete_task(&self, task_id: i64, now: i64) -> Result<()> {
        self.soft_delete_task_impl(task_id, now).await
    }

    async fn assign_students(&self, task_id: i64, student_ids: Vec<i64>) -> Result<Task> {
        self.assign_students_impl(task_id, student_ids).await
    }

    async fn list_teacher_tasks(
        &self,
        teacher_id: i64,
        query: TaskListQuery,
    ) -> Result<TaskListResponse> {
        self.list_teacher_tasks_impl(teacher_id, query).await
    }

    async fn list_student_tasks(
        &self,
        student_id: i64,
        query: TaskListQuery,
    ) -> Result<TaskListResponse> {
        self.list_student_tasks_impl(student_id, query).await
    }

    async fn get_task_students(&self, task_id: i64) -> Result<Vec<User>> {
        self.get_task_students_impl(task_id).await
    }

    async fn is_student_assigned(&self, task_id: i64, student_id: i64) -> Result<bool> {
        self.is_student_assigned_impl(task_id, student_id).await
    }

    // 提交模块
    async fn get_submission_by_id(&self, id: i64) -> Result<Option<Submission>> {
        self.get_submission_by_id_impl(id).await
    }

    async fn get_submission_by_task_and_student(
        &self,
        task_id: i64,
        student_id: i64,
    ) -> Result<Option<Submission>> {
        self.get_submission_by_task_and_student_impl(task_id, student_id)
            .await
    }

    async fn submit(
        &self,
        task_id: i64,
        student_id: i64,
        outcome: SubmitOutcome,
        files: Vec<FileDescriptor>,
    ) -> Result<Submission> {
        self.submit_impl(task_id, student_id, outcome, files).await
    }

    async fn review_submission(
        &self,
        submission_id: i64,
        teacher_id: i64,
        review: ReviewRequest,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        self.review_submission_impl(submission_id, teacher_id, review, now)
            .await
    }

    async fn list_submissions_by_task(
        &self,
        task_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        self.list_submissions_by_task_impl(task_id, query).await
    }

    async fn list_submissions_by_student(
        &self,
        student_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        self.list_submissions_by_student_impl(student_id, query)
            .await
    }

    async fn count_submissions(&self, task_id: i64) -> Result<SubmissionCounts> {
        self.count_submissions_impl(task_id).await
    }

    async fn list_task_students_status(
        &self,
        task_id: i64,
    ) -> Result<Vec<StudentSubmissionStatus>> {
        self.list_task_students_status_impl(task_id).await
    }

    // 文件模块
    async fn get_file_by_id(&self, id: i64) -> Result<Option<File>> {
        self.get_file_by_id_impl(id).await
    }

    async fn find_file_by_hash(&self, hash: &str) -> Result<Option<File>> {
        self.find_file_by_hash_impl(hash).await
    }

    async fn get_file_statistics(&self, task_id: i64) -> Result<FileStatistics> {
        self.get_file_statistics_impl(task_id).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::SeaOrmStorage;
    use crate::models::users::{
        entities::{User, UserProfile, UserRole},
        requests::CreateUserRequest,
    };

    pub(crate) async fn storage() -> SeaOrmStorage {
        SeaOrmStorage::in_memory().await.unwrap()
    }

    pub(crate) async fn user(storage: &SeaOrmStorage, username: &str, role: UserRole) -> User {
        storage
            .create_user_impl(CreateUserRequest {
                username: username.to_string(),
                password_hash: "x".to_string(),
                name: username.to_uppercase(),
                role,
                profile: UserProfile::default(),
            })
            .await
            .unwrap()
    }
}
