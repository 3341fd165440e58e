use actix_web::{HttpRequest, HttpResponse, ResponseError, Result as ActixResult};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::{Result, TaskDropError};
use crate::models::{
    ApiResponse,
    auth::{ExternalLoginRequest, LoginRequest, LoginResponse},
    users::entities::User,
};
use crate::storage::Storage;
use crate::utils::jwt::{JwtUtils, TokenPair};
use crate::utils::password::verify_password;

use super::AuthService;

/// 校验用户名和密码，返回登录用户
pub async fn authenticate(
    storage: &Arc<dyn Storage>,
    username: &str,
    password: &str,
) -> Result<User> {
    let user = storage
        .get_user_by_username(username.trim())
        .await?
        .filter(|user| verify_password(password, &user.password_hash))
        .ok_or_else(|| TaskDropError::authentication("用户名或密码错误"))?;

    if !user.is_active {
        return Err(TaskDropError::authorization("账号已被禁用"));
    }
    Ok(user)
}

/// 用外部账号 code 查找已绑定的用户
pub async fn authenticate_external(
    storage: &Arc<dyn Storage>,
    config: &AppConfig,
    code: &str,
) -> Result<User> {
    let code = code.trim();
    if code.is_empty() {
        return Err(TaskDropError::validation("code 不能为空"));
    }

    let external_id = config.external_id_for(code);
    let user = storage
        .get_user_by_external_id(&external_id)
        .await?
        .ok_or_else(|| TaskDropError::not_found("外部账号未绑定"))?;

    if !user.is_active {
        return Err(TaskDropError::authorization("账号已被禁用"));
    }
    Ok(user)
}

// 签发令牌并构建带 refresh cookie 的响应
fn login_response(user: User, config: &AppConfig) -> HttpResponse {
    let token_pair: TokenPair = match user.generate_token_pair() {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("Failed to generate JWT token: {}", e);
            return TaskDropError::authentication("登录失败，无法生成令牌")
                .error_response();
        }
    };

    tracing::info!("User {} logged in successfully", user.username);

    let response = LoginResponse {
        access_token: token_pair.access_token,
        expires_in: config.jwt.access_token_expiry * 60, // 转换为秒
        user,
        created_at: chrono::Utc::now(),
    };

    let refresh_cookie = JwtUtils::create_refresh_token_cookie(&token_pair.refresh_token);

    HttpResponse::Ok()
        .cookie(refresh_cookie)
        .json(ApiResponse::success(response, "登录成功"))
}

pub async fn handle_login(
    service: &AuthService,
    login_request: LoginRequest,
    request: &HttpRequest,
) -> ActixResult<HttpResponse> {
    let config = service.get_config();
    let result = match service.get_storage(request) {
        Ok(storage) => {
            authenticate(&storage, &login_request.username, &login_request.password).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => Ok(login_response(user, config)),
        Err(e) => {
            tracing::info!("Login rejected for {}: {}", login_request.username, e);
            Ok(e.error_response())
        }
    }
}

pub async fn handle_external_login(
    service: &AuthService,
    login_request: ExternalLoginRequest,
    request: &HttpRequest,
) -> ActixResult<HttpResponse> {
    let config = service.get_config();
    let result = match service.get_storage(request) {
        Ok(storage) => authenticate_external(&storage, config, &login_request.code).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => Ok(login_response(user, config)),
        Err(e) => Ok(e.error_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::entities::UserRole;
    use crate::models::users::requests::CreateUserRequest;
    use crate::storage::sea_orm_storage::test_support;
    use crate::utils::password::hash_password;

    async fn storage_with_teacher(password: &str) -> (Arc<dyn Storage>, User) {
        let storage = test_support::storage().await;
        let user = storage
            .create_user(CreateUserRequest {
                username: "alice".to_string(),
                password_hash: hash_password(password).unwrap(),
                name: "Alice".to_string(),
                role: UserRole::Teacher,
                profile: Default::default(),
            })
            .await
            .unwrap();
        let storage: Arc<dyn Storage> = Arc::new(storage);
        (storage, user)
    }

    #[tokio::test]
    async fn test_password_login() {
        let (storage, user) = storage_with_teacher("Secret123").await;

        let found = authenticate(&storage, "alice", "Secret123").await.unwrap();
        assert_eq!(found.id, user.id);

        let wrong = authenticate(&storage, "alice", "nope").await.unwrap_err();
        assert!(matches!(wrong, TaskDropError::Authentication(_)));

        let unknown = authenticate(&storage, "bob", "Secret123").await.unwrap_err();
        assert!(matches!(unknown, TaskDropError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_external_login_requires_binding() {
        let (storage, user) = storage_with_teacher("Secret123").await;
        let config = AppConfig::default();

        let err = authenticate_external(&storage, &config, "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));

        storage
            .bind_external_id(user.id, &config.external_id_for("abc"))
            .await
            .unwrap();
        let found = authenticate_external(&storage, &config, "abc").await.unwrap();
        assert_eq!(found.id, user.id);

        let empty = authenticate_external(&storage, &config, "  ").await.unwrap_err();
        assert!(matches!(empty, TaskDropError::Validation(_)));
    }
}
