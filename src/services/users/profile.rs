use actix_web::{HttpRequest, HttpResponse, Result as ActixResult};
use std::sync::Arc;

use super::UserService;
use crate::errors::{Result, TaskDropError};
use crate::middlewares::RequireJWT;
use crate::models::auth::responses::UserInfoResponse;
use crate::models::users::{entities::User, requests::UpdateProfileRequest};
use crate::services::{current_user, respond};
use crate::storage::Storage;
use crate::utils::validate::{validate_display_name, validate_phone};

/// 稀疏更新：缺省字段不变，空字符串清空电话和部门
pub async fn update_profile(
    storage: &Arc<dyn Storage>,
    user_id: i64,
    mut update: UpdateProfileRequest,
) -> Result<User> {
    if let Some(name) = update.name.as_mut() {
        *name = name.trim().to_string();
        validate_display_name(name).map_err(TaskDropError::validation)?;
    }
    if let Some(phone) = update.phone.as_mut() {
        *phone = phone.trim().to_string();
        validate_phone(phone).map_err(TaskDropError::validation)?;
    }
    if let Some(department) = update.department.as_mut() {
        *department = department.trim().to_string();
    }

    if update.is_empty() {
        return storage
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| TaskDropError::not_found("用户不存在"));
    }

    storage
        .update_profile(user_id, update)
        .await?
        .ok_or_else(|| TaskDropError::not_found("用户不存在"))
}

pub async fn handle_get_me(
    _service: &UserService,
    request: &HttpRequest,
) -> ActixResult<HttpResponse> {
    let result = current_user(request).map(|user| UserInfoResponse { user });
    Ok(respond(result, "获取用户信息成功"))
}

pub async fn handle_update_me(
    service: &UserService,
    update: UpdateProfileRequest,
    request: &HttpRequest,
) -> ActixResult<HttpResponse> {
    let result = async {
        let user = current_user(request)?;
        let storage = service.get_storage(request)?;
        update_profile(&storage, user.id, update).await
    }
    .await;

    if result.is_ok() {
        RequireJWT::invalidate_cached_user(request).await;
    }
    Ok(respond(
        result.map(|user| UserInfoResponse { user }),
        "个人信息更新成功",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::entities::UserRole;
    use crate::storage::sea_orm_storage::test_support;

    #[tokio::test]
    async fn test_sparse_profile_update() {
        let storage = test_support::storage().await;
        let user = test_support::user(&storage, "t1", UserRole::Teacher).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);

        let updated = update_profile(
            &storage,
            user.id,
            UpdateProfileRequest {
                phone: Some("13800000000".to_string()),
                department: Some(" CS ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, user.name);
        assert_eq!(updated.profile.phone.as_deref(), Some("13800000000"));
        assert_eq!(updated.profile.department.as_deref(), Some("CS"));

        // 空字符串清空电话，其余字段保持
        let cleared = update_profile(
            &storage,
            user.id,
            UpdateProfileRequest {
                phone: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.profile.phone, None);
        assert_eq!(cleared.profile.department.as_deref(), Some("CS"));
    }

    #[tokio::test]
    async fn test_profile_validation() {
        let storage = test_support::storage().await;
        let user = test_support::user(&storage, "s1", UserRole::Student).await;
        let storage: Arc<dyn Storage> = Arc::new(storage);

        let err = update_profile(
            &storage,
            user.id,
            UpdateProfileRequest {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));

        let unchanged = update_profile(&storage, user.id, UpdateProfileRequest::default())
            .await
            .unwrap();
        assert_eq!(unchanged.id, user.id);
    }
}
