use super::SeaOrmStorage;
use crate::entity::task_students::{
    ActiveModel as TaskStudentActiveModel, Column as TaskStudentColumn,
    Entity as TaskStudents,
};
use crate::entity::tasks::{ActiveModel, Column, Entity as Tasks};
use crate::entity::users::{Column as UserColumn, Entity as Users};
use crate::errors::{Result, TaskDropError};
use crate::models::{
    PaginationInfo,
    tasks::{
        Task, TaskStatus,
        lifecycle::dedup_student_ids,
        requests::{TaskFields, TaskListQuery},
        responses::TaskListResponse,
    },
    users::entities::{User, UserRole},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set,
    TransactionTrait, sea_query::Expr,
};

/// 将有效状态过滤翻译为存储字段上的条件
fn status_condition(status: TaskStatus, now: i64) -> Condition {
    match status {
        TaskStatus::Draft => Condition::all().add(Column::Status.eq(TaskStatus::DRAFT)),
        TaskStatus::Active => Condition::all()
            .add(Column::Status.eq(TaskStatus::ACTIVE))
            .add(Column::EndTime.gte(now)),
        TaskStatus::Expired => Condition::all()
            .add(Column::Status.eq(TaskStatus::ACTIVE))
            .add(Column::EndTime.lt(now)),
        TaskStatus::Completed => Condition::all().add(Column::Status.eq(TaskStatus::COMPLETED)),
    }
}

/// 在给定连接（通常是事务）上整体替换任务的学生名单并更新 total_students
pub(super) async fn replace_assignments<C: ConnectionTrait>(
    conn: &C,
    task_id: i64,
    student_ids: &[i64],
) -> Result<usize> {
    let ids = dedup_student_ids(student_ids);

    if !ids.is_empty() {
        let students = Users::find()
            .filter(UserColumn::Id.is_in(ids.clone()))
            .filter(UserColumn::Role.eq(UserRole::STUDENT))
            .count(conn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询学生失败: {e}")))?;
        if students != ids.len() as u64 {
            return Err(TaskDropError::validation(
                "student_ids 中包含不存在的用户或非学生",
            ));
        }
    }

    TaskStudents::delete_many()
        .filter(TaskStudentColumn::TaskId.eq(task_id))
        .exec(conn)
        .await
        .map_err(|e| TaskDropError::database_operation(format!("清除学生名单失败: {e}")))?;

    if !ids.is_empty() {
        let now = chrono::Utc::now().timestamp();
        let rows = ids.iter().map(|student_id| TaskStudentActiveModel {
            task_id: Set(task_id),
            student_id: Set(*student_id),
            created_at: Set(now),
        });
        TaskStudents::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
    }

    Tasks::update_many()
        .col_expr(Column::TotalStudents, Expr::value(ids.len() as i32))
        .filter(Column::Id.eq(task_id))
        .exec(conn)
        .await
        .map_err(|e| TaskDropError::database_operation(format!("更新学生数失败: {e}")))?;

    Ok(ids.len())
}

/// 条件写入没有命中任何行：任务不存在时为 NotFound，否则是状态不满足
async fn guard_failed<C: ConnectionTrait>(
    conn: &C,
    task_id: i64,
    state_message: impl Into<String>,
) -> TaskDropError {
    match Tasks::find_by_id(task_id)
        .filter(Column::DeletedAt.is_null())
        .one(conn)
        .await
    {
        Ok(Some(_)) => TaskDropError::state(state_message),
        Ok(None) => TaskDropError::not_found(format!("任务 {task_id} 不存在")),
        Err(e) => TaskDropError::database_operation(format!("查询任务失败: {e}")),
    }
}

fn apply_fields(model: &mut ActiveModel, fields: TaskFields) -> Result<()> {
    model.title = Set(fields.title);
    model.description = Set(fields.description);
    model.start_time = Set(fields.start_time.timestamp());
    model.end_time = Set(fields.end_time.timestamp());
    model.allowed_formats = Set(serde_json::to_string(&fields.allowed_formats)?);
    model.filename_template = Set(fields.filename_template);
    model.max_file_size = Set(fields.max_file_size);
    Ok(())
}

impl SeaOrmStorage {
    /// 创建草稿任务
    pub async fn create_task_impl(
        &self,
        teacher_id: i64,
        fields: TaskFields,
        student_ids: Option<Vec<i64>>,
    ) -> Result<Task> {
        let now = chrono::Utc::now().timestamp();

        let mut model = ActiveModel {
            teacher_id: Set(teacher_id),
            status: Set(TaskStatus::Draft.to_string()),
            total_students: Set(0),
            submitted_count: Set(0),
            on_time_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };
        apply_fields(&mut model, fields)?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("开启事务失败: {e}")))?;

        let inserted = model
            .insert(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("创建任务失败: {e}")))?;

        if let Some(ids) = student_ids {
            replace_assignments(&txn, inserted.id, &ids).await?;
        }

        txn.commit()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("提交事务失败: {e}")))?;

        self.get_task_by_id_impl(inserted.id)
            .await?
            .ok_or_else(|| TaskDropError::storage("创建后未能读回任务"))
    }

    /// 通过 ID 获取任务，已删除的视为不存在
    pub async fn get_task_by_id_impl(&self, id: i64) -> Result<Option<Task>> {
        let result = Tasks::find_by_id(id)
            .filter(Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询任务失败: {e}")))?;

        Ok(result.map(|m| m.into_task()))
    }

    /// 覆盖任务字段
    ///
    /// 写入条件带上 `status != completed`，与结束任务并发时只有一方生效。
    pub async fn update_task_impl(
        &self,
        task_id: i64,
        fields: TaskFields,
        student_ids: Option<Vec<i64>>,
    ) -> Result<Task> {
        let mut model = ActiveModel {
            updated_at: Set(chrono::Utc::now().timestamp()),
            ..Default::default()
        };
        apply_fields(&mut model, fields)?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("开启事务失败: {e}")))?;

        let result = Tasks::update_many()
            .set(model)
            .filter(Column::Id.eq(task_id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::Status.ne(TaskStatus::COMPLETED))
            .exec(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("更新任务失败: {e}")))?;
        if result.rows_affected == 0 {
            return Err(
                guard_failed(&txn, task_id, "已结束的任务不能修改").await,
            );
        }

        if let Some(ids) = student_ids {
            replace_assignments(&txn, task_id, &ids).await?;
        }

        txn.commit()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("提交事务失败: {e}")))?;

        self.get_task_by_id_impl(task_id)
            .await?
            .ok_or_else(|| TaskDropError::not_found(format!("任务 {task_id} 不存在")))
    }

    /// 状态迁移 `from -> to`，存储状态已不是 `from` 时返回 StateError
    pub async fn transition_task_status_impl(
        &self,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<()> {
        let result = Tasks::update_many()
            .col_expr(Column::Status, Expr::value(to.to_string()))
            .col_expr(
                Column::UpdatedAt,
                Expr::value(chrono::Utc::now().timestamp()),
            )
            .filter(Column::Id.eq(task_id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::Status.eq(from.to_string()))
            .exec(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("更新任务状态失败: {e}")))?;

        if result.rows_affected == 0 {
            return Err(guard_failed(
                &self.db,
                task_id,
                format!("任务状态已不是 {from}，无法变更为 {to}"),
            )
            .await);
        }
        Ok(())
    }

    /// 软删除任务，在 `now` 时刻仍进行中的任务不会被删除
    pub async fn soft_delete_task_impl(&self, task_id: i64, now: i64) -> Result<()> {
        let not_running = Condition::any()
            .add(Column::Status.ne(TaskStatus::ACTIVE))
            .add(Column::EndTime.lt(now));

        let result = Tasks::update_many()
            .col_expr(Column::DeletedAt, Expr::value(now))
            .filter(Column::Id.eq(task_id))
            .filter(Column::DeletedAt.is_null())
            .filter(not_running)
            .exec(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("删除任务失败: {e}")))?;

        if result.rows_affected == 0 {
            return Err(guard_failed(&self.db, task_id, "进行中的任务不能删除").await);
        }
        Ok(())
    }

    /// 整体替换学生名单，已结束的任务不可修改
    pub async fn assign_students_impl(&self, task_id: i64, student_ids: Vec<i64>) -> Result<Task> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("开启事务失败: {e}")))?;

        // 先按条件写任务行，同时拿到行锁
        let result = Tasks::update_many()
            .col_expr(
                Column::UpdatedAt,
                Expr::value(chrono::Utc::now().timestamp()),
            )
            .filter(Column::Id.eq(task_id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::Status.ne(TaskStatus::COMPLETED))
            .exec(&txn)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("更新任务失败: {e}")))?;
        if result.rows_affected == 0 {
            return Err(guard_failed(
                &txn,
                task_id,
                "已结束任务的学生名单不能修改",
            )
            .await);
        }

        replace_assignments(&txn, task_id, &student_ids).await?;

        txn.commit()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("提交事务失败: {e}")))?;

        self.get_task_by_id_impl(task_id)
            .await?
            .ok_or_else(|| TaskDropError::not_found(format!("任务 {task_id} 不存在")))
    }

    async fn paginate_tasks(
        &self,
        select: Select<Tasks>,
        query: &TaskListQuery,
    ) -> Result<TaskListResponse> {
        let page = query.page.unwrap_or(1).max(1) as u64;
        let size = query.size.unwrap_or(10).clamp(1, 100) as u64;

        let paginator = select.paginate(&self.db, size);
        let total = paginator
            .num_items()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询任务总数失败: {e}")))?;

        let pages = paginator
            .num_pages()
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询任务页数失败: {e}")))?;

        let tasks = paginator
            .fetch_page(page - 1)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询任务列表失败: {e}")))?;

        Ok(TaskListResponse {
            items: tasks
                .into_iter()
                .map(|m| m.into_task().with_effective_status(query.now))
                .collect(),
            pagination: PaginationInfo::new(page, size, total, pages),
        })
    }

    /// 教师自己的任务，按创建时间倒序
    pub async fn list_teacher_tasks_impl(
        &self,
        teacher_id: i64,
        query: TaskListQuery,
    ) -> Result<TaskListResponse> {
        let mut select = Tasks::find()
            .filter(Column::TeacherId.eq(teacher_id))
            .filter(Column::DeletedAt.is_null());

        if let Some(status) = query.status {
            select = select.filter(status_condition(status, query.now.timestamp()));
        }

        select = select
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id);

        self.paginate_tasks(select, &query).await
    }

    /// 分配给学生的任务，草稿不可见，按截止时间升序
    pub async fn list_student_tasks_impl(
        &self,
        student_id: i64,
        query: TaskListQuery,
    ) -> Result<TaskListResponse> {
        let mut select = Tasks::find()
            .join(
                JoinType::InnerJoin,
                crate::entity::tasks::Relation::TaskStudents.def(),
            )
            .filter(TaskStudentColumn::StudentId.eq(student_id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::Status.ne(TaskStatus::DRAFT));

        if let Some(status) = query.status {
            select = select.filter(status_condition(status, query.now.timestamp()));
        }

        select = select.order_by_asc(Column::EndTime).order_by_asc(Column::Id);

        self.paginate_tasks(select, &query).await
    }

    /// 任务的学生名单，按用户 ID 升序
    pub async fn get_task_students_impl(&self, task_id: i64) -> Result<Vec<User>> {
        let students = Users::find()
            .join(
                JoinType::InnerJoin,
                crate::entity::users::Relation::TaskStudents.def(),
            )
            .filter(TaskStudentColumn::TaskId.eq(task_id))
            .order_by_asc(UserColumn::Id)
            .all(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询学生名单失败: {e}")))?;

        Ok(students.into_iter().map(|m| m.into_user()).collect())
    }

    /// 学生是否在任务名单中
    pub async fn is_student_assigned_impl(&self, task_id: i64, student_id: i64) -> Result<bool> {
        let found = TaskStudents::find_by_id((task_id, student_id))
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询任务分配失败: {e}")))?;

        Ok(found.is_some())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::SeaOrmStorage;
    use super::super::test_support::{storage, user};
    use crate::errors::TaskDropError;
    use crate::models::tasks::{
        Task, TaskStatus,
        requests::{TaskFields, TaskListQuery},
    };
    use crate::models::users::entities::UserRole;
    use chrono::{DateTime, Duration, Utc};

    pub(crate) fn fields(now: DateTime<Utc>) -> TaskFields {
        TaskFields {
            title: "Lab".to_string(),
            description: None,
            start_time: now - Duration::days(1),
            end_time: now + Duration::days(1),
            allowed_formats: vec![".pdf".to_string()],
            filename_template: None,
            max_file_size: 1000,
        }
    }

    pub(crate) async fn active_task(
        storage: &SeaOrmStorage,
        teacher_id: i64,
        students: Vec<i64>,
        fields: TaskFields,
    ) -> Task {
        let task = storage
            .create_task_impl(teacher_id, fields, Some(students))
            .await
            .unwrap();
        storage
            .transition_task_status_impl(task.id, TaskStatus::Draft, TaskStatus::Active)
            .await
            .unwrap();
        storage.get_task_by_id_impl(task.id).await.unwrap().unwrap()
    }

    fn list_query(status: Option<TaskStatus>, now: DateTime<Utc>) -> TaskListQuery {
        TaskListQuery {
            page: Some(1),
            size: Some(10),
            status,
            now,
        }
    }

    #[tokio::test]
    async fn test_create_task_with_students() {
        let storage = storage().await;
        let now = Utc::now();
        let t = user(&storage, "t", UserRole::Teacher).await;
        let s1 = user(&storage, "s1", UserRole::Student).await;
        let s2 = user(&storage, "s2", UserRole::Student).await;

        let task = storage
            .create_task_impl(t.id, fields(now), Some(vec![s1.id, s2.id, s1.id]))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Draft);
        assert_eq!(task.total_students, 2);
        assert_eq!(task.allowed_formats, vec![".pdf"]);
        assert!(storage.is_student_assigned_impl(task.id, s2.id).await.unwrap());

        let students = storage.get_task_students_impl(task.id).await.unwrap();
        assert_eq!(
            students.iter().map(|u| u.id).collect::<Vec<_>>(),
            vec![s1.id, s2.id]
        );
    }

    #[tokio::test]
    async fn test_assignment_rejects_non_students_atomically() {
        let storage = storage().await;
        let now = Utc::now();
        let t = user(&storage, "t", UserRole::Teacher).await;
        let s1 = user(&storage, "s1", UserRole::Student).await;
        let task = storage
            .create_task_impl(t.id, fields(now), Some(vec![s1.id]))
            .await
            .unwrap();

        let err = storage
            .assign_students_impl(task.id, vec![s1.id, t.id])
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::Validation(_)));

        // 失败后原名单保持不变
        let reloaded = storage.get_task_by_id_impl(task.id).await.unwrap().unwrap();
        assert_eq!(reloaded.total_students, 1);
        assert!(storage.is_student_assigned_impl(task.id, s1.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_assignment_replaces_set() {
        let storage = storage().await;
        let now = Utc::now();
        let t = user(&storage, "t", UserRole::Teacher).await;
        let s1 = user(&storage, "s1", UserRole::Student).await;
        let s2 = user(&storage, "s2", UserRole::Student).await;
        let task = storage
            .create_task_impl(t.id, fields(now), Some(vec![s1.id]))
            .await
            .unwrap();

        let task = storage.assign_students_impl(task.id, vec![s2.id]).await.unwrap();
        assert_eq!(task.total_students, 1);
        assert!(!storage.is_student_assigned_impl(task.id, s1.id).await.unwrap());
        assert!(storage.is_student_assigned_impl(task.id, s2.id).await.unwrap());

        let task = storage.assign_students_impl(task.id, vec![]).await.unwrap();
        assert_eq!(task.total_students, 0);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_task() {
        let storage = storage().await;
        let now = Utc::now();
        let t = user(&storage, "t", UserRole::Teacher).await;
        let task = storage.create_task_impl(t.id, fields(now), None).await.unwrap();

        storage
            .soft_delete_task_impl(task.id, now.timestamp())
            .await
            .unwrap();
        assert!(storage.get_task_by_id_impl(task.id).await.unwrap().is_none());
        let err = storage
            .soft_delete_task_impl(task.id, now.timestamp())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskDropError::NotFound(_)));

        let listed = storage
            .list_teacher_tasks_impl(t.id, list_query(None, now))
            .await
            .unwrap();
        assert_eq!(listed.pagination.total, 0);
    }

    #[tokio::test]
    async fn test_update_task_overwrites_fields() {
        let storage = storage().await;
        let now = Utc::now();
        let t = user(&storage, "t", UserRole::Teacher).await;
        let task = storage.create_task_impl(t.id, fields(now), None).await.unwrap();

        let mut changed = fields(now);
        changed.title = "Lab 2".to_string();
        changed.allowed_formats = vec![];
        let updated = storage.update_task_impl(task.id, changed, None).await.unwrap();
        assert_eq!(updated.title, "Lab 2");
        assert!(updated.allowed_formats.is_empty());
        assert_eq!(updated.status, TaskStatus::Draft);
    }

    #[tokio::test]
    async fn test_status_filters_use_effective_status() {
        let storage = storage().await;
        let now = Utc::now();
        let t = user(&storage, "t", UserRole::Teacher).await;
        let s = user(&storage, "s", UserRole::Student).await;

        let mut past = fields(now);
        past.start_time = now - Duration::days(3);
        past.end_time = now - Duration::days(2);
        let expired = active_task(&storage, t.id, vec![s.id], past).await;
        let running = active_task(&storage, t.id, vec![s.id], fields(now)).await;
        storage
            .create_task_impl(t.id, fields(now), Some(vec![s.id]))
            .await
            .unwrap();

        let active = storage
            .list_teacher_tasks_impl(t.id, list_query(Some(TaskStatus::Active), now))
            .await
            .unwrap();
        assert_eq!(active.items.len(), 1);
        assert_eq!(active.items[0].id, running.id);

        let exp = storage
            .list_teacher_tasks_impl(t.id, list_query(Some(TaskStatus::Expired), now))
            .await
            .unwrap();
        assert_eq!(exp.items.len(), 1);
        assert_eq!(exp.items[0].id, expired.id);
        assert_eq!(exp.items[0].status, TaskStatus::Expired);

        // 学生看不到草稿，按截止时间升序
        let mine = storage
            .list_student_tasks_impl(s.id, list_query(None, now))
            .await
            .unwrap();
        assert_eq!(
            mine.items.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![expired.id, running.id]
        );
        assert_eq!(mine.pagination.total, 2);
    }
}
