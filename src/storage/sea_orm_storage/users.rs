use super::SeaOrmStorage;
use crate::entity::users::{ActiveModel, Column, Entity as Users};
use crate::errors::{Result, TaskDropError};
use crate::models::users::{
    entities::User,
    requests::{CreateUserRequest, UpdateProfileRequest},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};

impl SeaOrmStorage {
    /// 创建用户
    pub async fn create_user_impl(&self, req: CreateUserRequest) -> Result<User> {
        let now = chrono::Utc::now().timestamp();

        let model = ActiveModel {
            username: Set(req.username),
            password_hash: Set(req.password_hash),
            name: Set(req.name),
            role: Set(req.role.to_string()),
            is_active: Set(true),
            external_id: Set(None),
            student_no: Set(req.profile.student_no),
            major: Set(req.profile.major),
            grade: Set(req.profile.grade),
            class_name: Set(req.profile.class_name),
            teacher_no: Set(req.profile.teacher_no),
            phone: Set(req.profile.phone),
            department: Set(req.profile.department),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        // 用户名重复时转换为 Conflict
        let result = model.insert(&self.db).await?;

        Ok(result.into_user())
    }

    /// 通过 ID 获取用户
    pub async fn get_user_by_id_impl(&self, id: i64) -> Result<Option<User>> {
        let result = Users::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询用户失败: {e}")))?;

        Ok(result.map(|m| m.into_user()))
    }

    /// 通过用户名获取用户
    pub async fn get_user_by_username_impl(&self, username: &str) -> Result<Option<User>> {
        let result = Users::find()
            .filter(Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询用户失败: {e}")))?;

        Ok(result.map(|m| m.into_user()))
    }

    /// 通过外部账号 ID 获取用户
    pub async fn get_user_by_external_id_impl(&self, external_id: &str) -> Result<Option<User>> {
        let result = Users::find()
            .filter(Column::ExternalId.eq(external_id))
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询用户失败: {e}")))?;

        Ok(result.map(|m| m.into_user()))
    }

    /// 绑定外部账号
    pub async fn bind_external_id_impl(&self, user_id: i64, external_id: &str) -> Result<User> {
        if let Some(owner) = self.get_user_by_external_id_impl(external_id).await? {
            if owner.id == user_id {
                return Ok(owner);
            }
            return Err(TaskDropError::conflict(
                "该外部账号已绑定其他用户",
            ));
        }

        let model = ActiveModel {
            id: Set(user_id),
            external_id: Set(Some(external_id.to_string())),
            updated_at: Set(chrono::Utc::now().timestamp()),
            ..Default::default()
        };

        // 并发绑定同一外部账号时由唯一索引兜底，返回 Conflict
        match model.update(&self.db).await {
            Ok(updated) => Ok(updated.into_user()),
            Err(sea_orm::DbErr::RecordNotUpdated) => {
                Err(TaskDropError::not_found(format!("用户 {user_id} 不存在")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 更新个人资料
    pub async fn update_profile_impl(
        &self,
        user_id: i64,
        update: UpdateProfileRequest,
    ) -> Result<Option<User>> {
        // 先检查用户是否存在
        let existing = self.get_user_by_id_impl(user_id).await?;
        if existing.is_none() {
            return Ok(None);
        }

        let mut model = ActiveModel {
            id: Set(user_id),
            updated_at: Set(chrono::Utc::now().timestamp()),
            ..Default::default()
        };

        if let Some(name) = update.name {
            model.name = Set(name);
        }

        if let Some(phone) = update.phone {
            model.phone = Set(Some(phone).filter(|p| !p.is_empty()));
        }

        if let Some(department) = update.department {
            model.department = Set(Some(department).filter(|d| !d.is_empty()));
        }

        let updated = model
            .update(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("更新用户失败: {e}")))?;

        Ok(Some(updated.into_user()))
    }

    /// 用户总数
    pub async fn count_users_impl(&self) -> Result<u64> {
        Users::find()
            .count(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("统计用户数失败: {e}")))
    }
}
