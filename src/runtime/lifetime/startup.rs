use crate::cache::{ObjectCache, register::create_object_cache};
use crate::config::AppConfig;
use crate::errors::{Result, TaskDropError};
use crate::models::users::entities::{User, UserProfile, UserRole};
use crate::models::users::requests::CreateUserRequest;
use crate::storage::Storage;
use crate::utils::password::{generate_password, hash_password};
use crate::utils::validate::{is_strong_password, validate_username};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct StartupContext {
    pub storage: Arc<dyn Storage>,
    pub cache: Arc<dyn ObjectCache>,
}

/// 创建缓存实例
async fn create_cache() -> Result<Arc<dyn ObjectCache>> {
    let cache_type = &AppConfig::get().cache.cache_type;
    warn!("Attempting to create {} cache backend", cache_type);
    create_object_cache(cache_type).await
}

/// 空库时创建默认教师账号
///
/// 密码优先取 `password`（来自 `TEACHER_PASSWORD`），否则随机生成并打印到日志。
/// 已有用户时返回 `Ok(None)`。
pub async fn seed_default_teacher(
    storage: &Arc<dyn Storage>,
    username: &str,
    password: Option<String>,
) -> Result<Option<User>> {
    let count = storage.count_users().await?;
    if count > 0 {
        debug!(
            "Database already has {} user(s), skipping teacher seed",
            count
        );
        return Ok(None);
    }
    info!("No users found in database, creating default teacher account...");

    validate_username(username).map_err(TaskDropError::validation)?;

    let password = match password.filter(|p| !p.is_empty()) {
        Some(password) => {
            if !is_strong_password(&password) {
                warn!("TEACHER_PASSWORD is weak, consider a longer mixed-case password");
            }
            password
        }
        None => {
            let pwd = generate_password(16);
            warn!("==========================================================");
            warn!("  TEACHER PASSWORD NOT SET - USING GENERATED PASSWORD");
            warn!("  Generated password for '{}': {}", username, pwd);
            warn!("  Please save this password or set TEACHER_PASSWORD env var");
            warn!("==========================================================");
            pwd
        }
    };

    let user = storage
        .create_user(CreateUserRequest {
            username: username.to_string(),
            password_hash: hash_password(&password)?,
            name: "Default Teacher".to_string(),
            role: UserRole::Teacher,
            profile: UserProfile::default(),
        })
        .await?;

    info!(
        "Default teacher account created successfully (ID: {}, username: {})",
        user.id, user.username
    );
    Ok(Some(user))
}

/// 准备服务器启动的上下文
/// 包括存储、缓存和默认账号
pub async fn prepare_server_startup() -> Result<StartupContext> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    if cfg!(debug_assertions) {
        crate::cache::register::debug_object_cache_registry();
        debug!("Debug mode: Cache registry is enabled");
    }

    let config = AppConfig::get();

    let storage = crate::storage::create_storage().await?;
    warn!("Storage backend initialized and migrations completed");

    // 初始化默认教师账号（如果需要）
    if let Err(e) = seed_default_teacher(
        &storage,
        &config.auth.seed_teacher_username,
        std::env::var("TEACHER_PASSWORD").ok(),
    )
    .await
    {
        warn!("Failed to seed default teacher: {}", e);
    }

    // 创建缓存实例
    let cache = create_cache().await?;
    warn!("Cache backend initialized");

    Ok(StartupContext { storage, cache })
}
