//! 任务实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub teacher_id: i64,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub status: String,
    pub start_time: i64,
    pub end_time: i64,
    /// JSON 数组
    #[sea_orm(column_type = "Text")]
    pub allowed_formats: String,
    pub filename_template: Option<String>,
    pub max_file_size: i64,
    pub total_students: i32,
    pub submitted_count: i32,
    pub on_time_count: i32,
    pub created_at: i64,
    pub updated_at: i64,
    /// 软删除时间，非空即视为已删除
    pub deleted_at: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::TeacherId",
        to = "super::users::Column::Id"
    )]
    Teacher,
    #[sea_orm(has_many = "super::task_students::Entity")]
    TaskStudents,
    #[sea_orm(has_many = "super::submissions::Entity")]
    Submissions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::task_students::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskStudents.def()
    }
}

impl Related<super::submissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_task(self) -> crate::models::tasks::Task {
        use crate::models::tasks::{Task, TaskStatus};
        use chrono::{DateTime, Utc};

        Task {
            id: self.id,
            teacher_id: self.teacher_id,
            title: self.title,
            description: self.description,
            status: self.status.parse::<TaskStatus>().unwrap_or(TaskStatus::Draft),
            start_time: DateTime::<Utc>::from_timestamp(self.start_time, 0).unwrap_or_default(),
            end_time: DateTime::<Utc>::from_timestamp(self.end_time, 0).unwrap_or_default(),
            allowed_formats: serde_json::from_str(&self.allowed_formats).unwrap_or_default(),
            filename_template: self.filename_template,
            max_file_size: self.max_file_size,
            total_students: self.total_students,
            submitted_count: self.submitted_count,
            on_time_count: self.on_time_count,
            created_at: DateTime::<Utc>::from_timestamp(self.created_at, 0).unwrap_or_default(),
            updated_at: DateTime::<Utc>::from_timestamp(self.updated_at, 0).unwrap_or_default(),
        }
    }
}
