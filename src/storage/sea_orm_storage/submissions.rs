use std::collections::HashMap;

use super::SeaOrmStorage;
use crate::entity::files::{
    ActiveModel as FileActiveModel, Column as FileColumn, Entity as Files,
};
use crate::entity::submissions::{ActiveModel, Column, Entity as Submissions, Model};
use crate::entity::task_students::{Column as TaskStudentColumn, Entity as TaskStudents};
use crate::entity::tasks::{Column as TaskColumn, Entity as Tasks};
use crate::errors::{Result, TaskDropError};
use crate::models::{
    PaginationInfo,
    files::{File, FileDescriptor},
    statistics::SubmissionCounts,
    submissions::{
        Submission, SubmissionStatus,
        lifecycle::SubmitOutcome,
        requests::{ReviewRequest, SubmissionListQuery},
        responses::{StudentSubmissionStatus, SubmissionListResponse},
    },
    users::responses::StudentBrief,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
    TransactionTrait, sea_query::{Expr, NullOrdering},
};

fn submitted_states() -> Vec<String> {
    SubmissionStatus::submitted_states()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 按提交 ID 分组加载未删除的文件，组内按上传顺序
async fn load_files<C: ConnectionTrait>(
    conn: &C,
    submission_ids: Vec<i64>,
) -> Result<HashMap<i64, Vec<File>>> {
    let mut grouped: HashMap<i64, Vec<File>> = HashMap::new();
    if submission_ids.is_empty() {
        return Ok(grouped);
    }

    let files = Files::find()
        .filter(FileColumn::SubmissionId.is_in(submission_ids))
        .filter(FileColumn::IsDeleted.eq(false))
        .order_by_asc(FileColumn::Id)
        .all(conn)
        .await
        .map_err(|e| TaskDropError::database_operation(format!("查询文件失败: {e}")))?;

    for file in files {
        grouped
            .entry(file.submission_id)
            .or_default()
            .push(file.into_file());
    }
    Ok(grouped)
}

async fn with_files<C: ConnectionTrait>(conn: &C, models: Vec<Model>) -> Result<Vec<Submission>> {
    let mut files = load_files(conn, models.iter().map(|m| m.id).collect()).await?;
    Ok(models
        .into_iter()
        .map(|m| {
            let attached = files.remove(&m.id).unwrap_or_default();
            m.into_submission(attached)
        })
        .collect())
}

/// 重新统计任务上的已提交数和按时数
pub(super) async fn refresh_task_counters<C: ConnectionTrait>(conn: &C, task_id: i64) -> Result<()> {
    let submitted = Submissions::find()
        .filter(Column::TaskId.eq(task_id))
        .filter(Column::Status.is_in(submitted_states()))
        .count(conn)
        .await
        .map_err(|e| TaskDropError::database_operation(format!("统计提交数失败: {e}")))?;

    let on_time = Submissions::find()
        .filter(Column::TaskId.eq(task_id))
        .filter(Column::IsOnTime.eq(true))
        .count(conn)
        .await
        .map_err(|e| TaskDropError::database_operation(format!("统计按时数失败: {e}")))?;

    Tasks::update_many()
        .col_expr(TaskColumn::SubmittedCount, Expr::value(submitted as i32))
        .col_expr(TaskColumn::OnTimeCount, Expr::value(on_time as i32))
        .filter(TaskColumn::Id.eq(task_id))
        .exec(conn)
        .await
        .map_err(|e| TaskDropError::database_operation(format!("更新任务计数失败: {e}")))?;

    Ok(())
}

/// 提交时间倒序（未提交的排最后），同一时间按学生 ID 升序
fn ordered(select: Select<Submissions>) -> Select<Submissions> {
    select
        .order_by_with_nulls(Column::SubmittedAt, Order::Desc, NullOrdering::Last)
        .order_by_asc(Column::StudentId)
        .order_by_asc(Column::Id)
}

impl SeaOrmStorage {
    /// 通过 ID 获取提交（含文件）
    pub async fn get_submission_by_id_impl(&self, id: i64) -> Result<Option<Submission>> {
        let result = Submissions::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交失败: {e}")))?;

        match result {
            Some(model) => Ok(with_files(&self.db, vec![model]).await?.pop()),
            None => Ok(None),
        }
    }

    /// 获取学生在某任务下的提交
    pub async fn get_submission_by_task_and_student_impl(
        &self,
        task_id: i64,
        student_id: i64,
    ) -> Result<Option<Submission>> {
        let result = Submissions::find()
            .filter(Column::TaskId.eq(task_id))
            .filter(Column::StudentId.eq(student_id))
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交失败: {e}")))?;

        match result {
            Some(model) => Ok(with_files(&self.db, vec![model]).await?.pop()),
            None => Ok(None),
        }
    }

    /// 写入一次提交
    ///
    /// 在同一事务内：找到或创建提交记录，把旧文件标记删除，写入新文件，
    /// 更新提交状态，刷新任务计数。
    pub async fn submit_impl(
        &self,
        task_id: i64,
        student_id: i64,
        outcome: SubmitOutcome,
        files: Vec<FileDescriptor>,
    ) -> Result<Submission> {
        let now = Utc::now().timestamp();
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("开启事务失败: {e}")))?;

        let existing = Submissions::find()
            .filter(Column::TaskId.eq(task_id))
            .filter(Column::StudentId.eq(student_id))
            .one(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交失败: {e}")))?;

        let submission_id = match existing {
            Some(model) => model.id,
            None => {
                let pending = ActiveModel {
                    task_id: Set(task_id),
                    student_id: Set(student_id),
                    status: Set(SubmissionStatus::Pending.to_string()),
                    submitted_at: Set(None),
                    is_on_time: Set(false),
                    score: Set(None),
                    comment: Set(None),
                    reviewed_at: Set(None),
                    reviewed_by: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                // (task_id, student_id) 唯一索引冲突时返回 Conflict
                pending.insert(&txn).await?.id
            }
        };

        Files::update_many()
            .col_expr(FileColumn::IsDeleted, Expr::value(true))
            .filter(FileColumn::SubmissionId.eq(submission_id))
            .filter(FileColumn::IsDeleted.eq(false))
            .exec(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("替换旧文件失败: {e}")))?;

        if !files.is_empty() {
            let rows = files.into_iter().map(|f| FileActiveModel {
                original_name: Set(f.original_name),
                stored_name: Set(f.stored_name),
                file_path: Set(f.file_path),
                file_size: Set(f.file_size),
                content_type: Set(f.content_type),
                file_hash: Set(f.file_hash),
                submission_id: Set(submission_id),
                student_id: Set(student_id),
                task_id: Set(task_id),
                is_deleted: Set(false),
                created_at: Set(now),
                ..Default::default()
            });
            Files::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| TaskDropError::database_operation(format!("保存文件失败: {e}")))?;
        }

        Submissions::update_many()
            .col_expr(Column::Status, Expr::value(outcome.status.to_string()))
            .col_expr(
                Column::SubmittedAt,
                Expr::value(outcome.submitted_at.timestamp()),
            )
            .col_expr(Column::IsOnTime, Expr::value(outcome.is_on_time))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(submission_id))
            .exec(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("更新提交状态失败: {e}")))?;

        refresh_task_counters(&txn, task_id).await?;

        txn.commit()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("提交事务失败: {e}")))?;

        self.get_submission_by_id_impl(submission_id)
            .await?
            .ok_or_else(|| TaskDropError::storage("提交后未能读回提交记录"))
    }

    /// 写入批阅结果，覆盖之前的批阅
    pub async fn review_submission_impl(
        &self,
        submission_id: i64,
        teacher_id: i64,
        review: ReviewRequest,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("开启事务失败: {e}")))?;

        let existing = Submissions::find_by_id(submission_id)
            .one(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交失败: {e}")))?
            .ok_or_else(|| {
                TaskDropError::not_found(format!("提交 {submission_id} 不存在"))
            })?;

        let model = ActiveModel {
            id: Set(existing.id),
            status: Set(SubmissionStatus::Reviewed.to_string()),
            score: Set(review.score),
            comment: Set(review.comment),
            reviewed_at: Set(Some(now.timestamp())),
            reviewed_by: Set(Some(teacher_id)),
            updated_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        model
            .update(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("保存批阅失败: {e}")))?;

        refresh_task_counters(&txn, existing.task_id).await?;

        txn.commit()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("提交事务失败: {e}")))?;

        self.get_submission_by_id_impl(submission_id)
            .await?
            .ok_or_else(|| TaskDropError::not_found(format!("提交 {submission_id} 不存在")))
    }

    async fn paginate_submissions(
        &self,
        select: Select<Submissions>,
        query: &SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        let page = query.page.unwrap_or(1).max(1) as u64;
        let size = query.size.unwrap_or(10).clamp(1, 100) as u64;

        let mut select = select;
        if let Some(status) = query.status {
            select = select.filter(Column::Status.eq(status.to_string()));
        }

        let paginator = ordered(select).paginate(&self.db, size);
        let total = paginator
            .num_items()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交总数失败: {e}")))?;

        let pages = paginator
            .num_pages()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交页数失败: {e}")))?;

        let models = paginator
            .fetch_page(page - 1)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交列表失败: {e}")))?;

        Ok(SubmissionListResponse {
            items: with_files(&self.db, models).await?,
            pagination: PaginationInfo::new(page, size, total, pages),
        })
    }

    /// 任务下的提交
    pub async fn list_submissions_by_task_impl(
        &self,
        task_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        let select = Submissions::find().filter(Column::TaskId.eq(task_id));
        self.paginate_submissions(select, &query).await
    }

    /// 学生自己的提交，已删除任务下的提交不返回
    pub async fn list_submissions_by_student_impl(
        &self,
        student_id: i64,
        query: SubmissionListQuery,
    ) -> Result<SubmissionListResponse> {
        let select = Submissions::find()
            .join(
                JoinType::InnerJoin,
                crate::entity::submissions::Relation::Task.def(),
            )
            .filter(TaskColumn::DeletedAt.is_null())
            .filter(Column::StudentId.eq(student_id));
        self.paginate_submissions(select, &query).await
    }

    /// 统计计数
    pub async fn count_submissions_impl(&self, task_id: i64) -> Result<SubmissionCounts> {
        let db_err = |e: sea_orm::DbErr| TaskDropError::database_operation(format!("统计提交失败: {e}"));

        let total_students = TaskStudents::find()
            .filter(TaskStudentColumn::TaskId.eq(task_id))
            .count(&self.db)
            .await
            .map_err(db_err)?;

        let submitted_count = Submissions::find()
            .filter(Column::TaskId.eq(task_id))
            .filter(Column::Status.is_in(submitted_states()))
            .count(&self.db)
            .await
            .map_err(db_err)?;

        let on_time_count = Submissions::find()
            .filter(Column::TaskId.eq(task_id))
            .filter(Column::IsOnTime.eq(true))
            .count(&self.db)
            .await
            .map_err(db_err)?;

        let late_count = Submissions::find()
            .filter(Column::TaskId.eq(task_id))
            .filter(Column::Status.eq(SubmissionStatus::LATE))
            .count(&self.db)
            .await
            .map_err(db_err)?;

        Ok(SubmissionCounts {
            total_students: total_students as i64,
            submitted_count: submitted_count as i64,
            on_time_count: on_time_count as i64,
            late_count: late_count as i64,
        })
    }

    /// 名单中每个学生及其提交，没有提交的也列出
    pub async fn list_task_students_status_impl(
        &self,
        task_id: i64,
    ) -> Result<Vec<StudentSubmissionStatus>> {
        let students = self.get_task_students_impl(task_id).await?;

        let models = Submissions::find()
            .filter(Column::TaskId.eq(task_id))
            .all(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询提交失败: {e}")))?;
        let mut by_student: HashMap<i64, Submission> = with_files(&self.db, models)
            .await?
            .into_iter()
            .map(|s| (s.student_id, s))
            .collect();

        Ok(students
            .iter()
            .map(|student| {
                let submission = by_student.remove(&student.id);
                StudentSubmissionStatus {
                    student: StudentBrief::from(student),
                    has_submission: submission.is_some(),
                    submission,
                }
            })
            .collect())
    }
}
