use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use std::sync::Arc;

use super::UserService;
use crate::config::AppConfig;
use crate::errors::{Result, TaskDropError};
use crate::middlewares::RequireJWT;
use crate::models::auth::responses::UserInfoResponse;
use crate::models::users::entities::User;
use crate::models::users::requests::BindExternalRequest;
use crate::services::{current_user, respond};
use crate::storage::Storage;

/// 绑定外部账号；已被其他用户占用时返回 Conflict
pub async fn bind_external(
    storage: &Arc<dyn Storage>,
    config: &AppConfig,
    user_id: i64,
    code: &str,
) -> Result<User> {
    let code = code.trim();
    if code.is_empty() {
        return Err(TaskDropError::validation("code 不能为空"));
    }
    let user = storage
        .bind_external_id(user_id, &config.external_id_for(code))
        .await?;
    tracing::info!("User {} bound an external account", user_id);
    Ok(user)
}

pub async fn handle_bind_external(
    service: &UserService,
    bind: BindExternalRequest,
    request: &HttpRequest,
) -> ActixResult<HttpResponse> {
    let result = async {
        let user = current_user(request)?;
        let storage = service.get_storage(request)?;
        bind_external(&storage, AppConfig::get(), user.id, &bind.code).await
    }
    .await;

    if result.is_ok() {
        RequireJWT::invalidate_cached_user(request).await;
    }
    Ok(respond(
        result.map(|user| UserInfoResponse { user }),
        "外部账号绑定成功",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::entities::UserRole;
    use crate::storage::sea_orm_storage::test_support;

    #[tokio::test]
    async fn test_bind_conflict_with_other_user() {
        let storage = test_support::storage().await;
        let first = test_support::user(&storage, "s1", UserRole::Student).await;
        let second = test_support::user(&storage, "s2", UserRole::Student).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);
        let config = AppConfig::default();

        let bound = bind_external(&storage, &config, first.id, "wx1").await.unwrap();
        assert!(bound.external_bound);

        // 同一用户重复绑定是幂等的
        assert!(bind_external(&storage, &config, first.id, "wx1").await.is_ok());

        let err = bind_external(&storage, &config, second.id, "wx1")
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Conflict(_)));
    }
}
