//! 文件实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub original_name: String,
    pub stored_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub file_hash: String,
    pub submission_id: i64,
    pub student_id: i64,
    pub task_id: i64,
    /// 重新提交时旧文件被标记删除，不物理移除
    pub is_deleted: bool,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::submissions::Entity",
        from = "Column::SubmissionId",
        to = "super::submissions::Column::Id"
    )]
    Submission,
}

impl Related<super::submissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_file(self) -> crate::models::files::File {
        use crate::models::files::File;
        use chrono::{DateTime, Utc};

        File {
            id: self.id,
            original_name: self.original_name,
            stored_name: self.stored_name,
            file_path: self.file_path,
            file_size: self.file_size,
            content_type: self.content_type,
            file_hash: self.file_hash,
            submission_id: self.submission_id,
            student_id: self.student_id,
            task_id: self.task_id,
            is_deleted: self.is_deleted,
            created_at: DateTime::<Utc>::from_timestamp(self.created_at, 0).unwrap_or_default(),
        }
    }
}
