use crate::cache::traits::ObjectCache;
use crate::errors::{Result, TaskDropError};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::{future::Future, pin::Pin, sync::Arc};
use tracing::{debug, warn};

pub type BoxedObjectCacheFuture =
    Pin<Box<dyn Future<Output = Result<Box<dyn ObjectCache>>> + Send>>;
pub type ObjectCacheConstructor = Arc<dyn Fn() -> BoxedObjectCacheFuture + Send + Sync>;

/// 兜底后端，进程内存实现，不依赖外部服务
pub const FALLBACK_BACKEND: &str = "moka";

static OBJECT_CACHE_REGISTRY: Lazy<DashMap<String, ObjectCacheConstructor>> =
    Lazy::new(DashMap::new);

pub fn register_object_cache_plugin<S: Into<String>>(name: S, constructor: ObjectCacheConstructor) {
    OBJECT_CACHE_REGISTRY.insert(name.into(), constructor);
}

pub fn get_object_cache_plugin(name: &str) -> Option<ObjectCacheConstructor> {
    OBJECT_CACHE_REGISTRY
        .get(name)
        .map(|entry| Arc::clone(entry.value()))
}

/// 已注册的后端名称（排序后）
pub fn registered_backends() -> Vec<String> {
    let mut names: Vec<String> = OBJECT_CACHE_REGISTRY
        .iter()
        .map(|entry| entry.key().clone())
        .collect();
    names.sort();
    names
}

pub fn debug_object_cache_registry() {
    let names = registered_backends();
    if names.is_empty() {
        debug!("No object cache plugins registered.");
    } else {
        debug!("Registered object cache plugins: {}", names.join(", "));
    }
}

async fn build(name: &str) -> Result<Arc<dyn ObjectCache>> {
    let constructor = get_object_cache_plugin(name).ok_or_else(|| {
        TaskDropError::cache_plugin_not_found(format!("Cache backend '{name}' not registered"))
    })?;
    constructor().await.map(Arc::from)
}

/// 按名称创建缓存后端
///
/// 首选后端不存在或连接失败时回退到 [`FALLBACK_BACKEND`]。
pub async fn create_object_cache(preferred: &str) -> Result<Arc<dyn ObjectCache>> {
    match build(preferred).await {
        Ok(cache) => {
            warn!("Successfully created {} cache backend", preferred);
            return Ok(cache);
        }
        Err(e) => warn!("Failed to create {} cache: {}", preferred, e),
    }

    if preferred == FALLBACK_BACKEND {
        return Err(TaskDropError::cache_plugin_not_found(format!(
            "No cache backend available (tried: {preferred})"
        )));
    }

    warn!("Falling back to {} (in-memory) cache", FALLBACK_BACKEND);
    build(FALLBACK_BACKEND).await.map_err(|e| {
        TaskDropError::cache_plugin_not_found(format!(
            "No cache backend available (tried: {preferred}, {FALLBACK_BACKEND}): {e}"
        ))
    })
}
