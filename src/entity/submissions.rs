//! 提交实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub task_id: i64,
    pub student_id: i64,
    pub status: String,
    pub submitted_at: Option<i64>,
    pub is_on_time: bool,
    #[sea_orm(column_type = "Double", nullable)]
    pub score: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,
    pub reviewed_at: Option<i64>,
    pub reviewed_by: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tasks::Entity",
        from = "Column::TaskId",
        to = "super::tasks::Column::Id"
    )]
    Task,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::StudentId",
        to = "super::users::Column::Id"
    )]
    Student,
    #[sea_orm(has_many = "super::files::Entity")]
    Files,
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 转换为业务模型，`files` 由调用方单独查询后传入
    pub fn into_submission(
        self,
        files: Vec<crate::models::files::File>,
    ) -> crate::models::submissions::Submission {
        use crate::models::submissions::{Submission, SubmissionStatus};
        use chrono::{DateTime, Utc};

        let ts = |v: i64| DateTime::<Utc>::from_timestamp(v, 0).unwrap_or_default();
        Submission {
            id: self.id,
            task_id: self.task_id,
            student_id: self.student_id,
            status: self
                .status
                .parse::<SubmissionStatus>()
                .unwrap_or(SubmissionStatus::Pending),
            submitted_at: self.submitted_at.map(ts),
            is_on_time: self.is_on_time,
            files,
            score: self.score,
            comment: self.comment,
            reviewed_at: self.reviewed_at.map(ts),
            reviewed_by: self.reviewed_by,
            created_at: ts(self.created_at),
            updated_at: ts(self.updated_at),
        }
    }
}
