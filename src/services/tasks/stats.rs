use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use moka::future::Cache;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

use super::{TaskService, load_task};
use crate::config::AppConfig;
use crate::errors::{Result, TaskDropError};
use crate::models::files::FileStatistics;
use crate::models::statistics::TaskStatistics;
use crate::models::submissions::responses::StudentSubmissionStatus;
use crate::models::tasks::lifecycle;
use crate::models::users::entities::User;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 统计查询合并器
///
/// 相同任务的并发查询只会访问一次存储层，结果在 TTL 内复用。
#[derive(Clone)]
pub struct StatsCoalescer {
    cache: Cache<i64, TaskStatistics>,
}

impl StatsCoalescer {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build(),
        }
    }

    pub async fn get_or_load(
        &self,
        storage: &Arc<dyn Storage>,
        task_id: i64,
    ) -> Result<TaskStatistics> {
        let storage = storage.clone();
        self.cache
            .try_get_with(task_id, async move {
                storage
                    .count_submissions(task_id)
                    .await
                    .map(TaskStatistics::from_counts)
            })
            .await
            .map_err(|e: Arc<TaskDropError>| (*e).clone())
    }

    pub async fn invalidate(&self, task_id: i64) {
        self.cache.invalidate(&task_id).await;
    }
}

static STATS_COALESCER: Lazy<StatsCoalescer> = Lazy::new(|| {
    StatsCoalescer::new(Duration::from_millis(
        AppConfig::get().statistics.coalesce_ttl_ms.max(1),
    ))
});

/// 提交、批阅或名单变化后调用
pub async fn invalidate_statistics(task_id: i64) {
    STATS_COALESCER.invalidate(task_id).await;
}

async fn owned_task_check(storage: &Arc<dyn Storage>, teacher: &User, task_id: i64) -> Result<()> {
    let task = load_task(storage, task_id).await?;
    lifecycle::ensure_owner(&task, teacher.id)
}

pub async fn task_statistics(
    storage: &Arc<dyn Storage>,
    coalescer: &StatsCoalescer,
    teacher: &User,
    task_id: i64,
) -> Result<TaskStatistics> {
    owned_task_check(storage, teacher, task_id).await?;
    coalescer.get_or_load(storage, task_id).await
}

/// 名单中所有学生及其提交，不按状态过滤
pub async fn students_status(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
) -> Result<Vec<StudentSubmissionStatus>> {
    owned_task_check(storage, teacher, task_id).await?;
    storage.list_task_students_status(task_id).await
}

pub async fn file_statistics(
    storage: &Arc<dyn Storage>,
    teacher: &User,
    task_id: i64,
) -> Result<FileStatistics> {
    owned_task_check(storage, teacher, task_id).await?;
    storage.get_file_statistics(task_id).await
}

pub async fn handle_task_statistics(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        task_statistics(&storage, &STATS_COALESCER, &teacher, task_id).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

pub async fn handle_students_status(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        students_status(&storage, &teacher, task_id).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}

pub async fn handle_file_statistics(
    service: &TaskService,
    request: &HttpRequest,
    task_id: i64,
) -> ActixResult<HttpResponse> {
    let result = async {
        let teacher = current_user(request)?;
        let storage = service.get_storage(request)?;
        file_statistics(&storage, &teacher, task_id).await
    }
    .await;
    Ok(respond(result, "查询成功"))
}
