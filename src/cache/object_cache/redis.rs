use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult, aio::MultiplexedConnection};
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use crate::cache::{CacheResult, ObjectCache};
use crate::config::AppConfig;
use crate::declare_object_cache_plugin;

declare_object_cache_plugin!("redis", RedisObjectCache);

/// 单次 SCAN 返回的建议数量
const SCAN_BATCH: usize = 200;

/// Redis 后端，所有键带统一前缀
pub struct RedisObjectCache {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
    key_prefix: String,
    default_ttl: u64,
}

impl RedisObjectCache {
    pub fn new() -> Result<Self, String> {
        let config = AppConfig::get();
        let redis_config = &config.cache.redis;

        let cache = Self::with_client(
            &redis_config.url,
            &redis_config.key_prefix,
            config.cache.default_ttl,
        )?;

        // 启动时同步 PING 一次，失败则交给上层回退到内存缓存
        let mut conn = cache
            .client
            .get_connection()
            .map_err(|e| format!("Redis connect failed ({}): {e}", redis_config.url))?;
        let pong: String = redis::cmd("PING")
            .query(&mut conn)
            .map_err(|e| format!("Redis ping failed ({}): {e}", redis_config.url))?;
        debug!(
            "Redis reachable ({}), prefix '{}', default TTL {}s",
            pong, cache.key_prefix, cache.default_ttl
        );

        Ok(cache)
    }

    fn with_client(url: &str, key_prefix: &str, default_ttl: u64) -> Result<Self, String> {
        let client =
            redis::Client::open(url).map_err(|e| format!("Invalid Redis URL '{url}': {e}"))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            key_prefix: key_prefix.to_string(),
            default_ttl,
        })
    }

    /// 复用同一个多路复用连接，首次使用时建立
    async fn connection(&self) -> Option<MultiplexedConnection> {
        let result: RedisResult<&MultiplexedConnection> = self
            .conn
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await;
        match result {
            Ok(conn) => Some(conn.clone()),
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                None
            }
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn effective_ttl(&self, ttl: u64) -> u64 {
        if ttl == 0 { self.default_ttl } else { ttl }
    }

    async fn scan_prefixed_keys(&self, conn: &mut MultiplexedConnection) -> RedisResult<Vec<String>> {
        let pattern = format!("{}*", self.key_prefix);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl ObjectCache for RedisObjectCache {
    async fn get_raw(&self, key: &str) -> CacheResult<String> {
        let Some(mut conn) = self.connection().await else {
            return CacheResult::ExistsButNoValue;
        };

        let result: RedisResult<Option<String>> = conn.get(self.make_key(key)).await;
        match result {
            Ok(Some(data)) => CacheResult::Found(data),
            Ok(None) => CacheResult::NotFound,
            Err(e) => {
                error!("Failed to get key '{}': {}", key, e);
                CacheResult::ExistsButNoValue
            }
        }
    }

    async fn insert_raw(&self, key: String, value: String, ttl: u64) {
        let Some(mut conn) = self.connection().await else {
            return;
        };

        let ttl = self.effective_ttl(ttl);
        if let Err(e) = conn
            .set_ex::<String, String, ()>(self.make_key(&key), value, ttl)
            .await
        {
            error!("Failed to insert key '{}' into cache: {}", key, e);
        } else {
            debug!("Cached key {} (TTL: {}s)", key, ttl);
        }
    }

    async fn remove(&self, key: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };

        if let Err(e) = conn.del::<String, i32>(self.make_key(key)).await {
            error!("Failed to remove key '{}': {}", key, e);
        }
    }

    async fn invalidate_all(&self) {
        let Some(mut conn) = self.connection().await else {
            return;
        };

        let keys = match self.scan_prefixed_keys(&mut conn).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("Failed to scan keys with prefix '{}': {}", self.key_prefix, e);
                return;
            }
        };
        if keys.is_empty() {
            return;
        }

        match conn.del::<Vec<String>, i32>(keys).await {
            Ok(count) => warn!("Invalidated {} cached keys", count),
            Err(e) => error!("Failed to invalidate cached keys: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_prefixed_and_ttl_defaults() {
        let cache = RedisObjectCache::with_client("redis://127.0.0.1/", "taskdrop:", 300).unwrap();
        assert_eq!(cache.make_key("user:abc"), "taskdrop:user:abc");
        assert_eq!(cache.effective_ttl(0), 300);
        assert_eq!(cache.effective_ttl(5), 5);
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(RedisObjectCache::with_client("not-a-url", "p:", 1).is_err());
    }
}
