//! 文件存储操作

use super::SeaOrmStorage;
use crate::entity::files::{Column, Entity as Files};
use crate::errors::{Result, TaskDropError};
use crate::models::files::{File, FileStatistics};
use sea_orm::sea_query::Alias;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, ExprTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

impl SeaOrmStorage {
    /// 通过 ID 获取文件（包括已被替换的）
    pub async fn get_file_by_id_impl(&self, id: i64) -> Result<Option<File>> {
        let result = Files::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询文件失败: {e}")))?;

        Ok(result.map(|m| m.into_file()))
    }

    /// 按内容哈希查找最早的未删除文件
    pub async fn find_file_by_hash_impl(&self, hash: &str) -> Result<Option<File>> {
        let result = Files::find()
            .filter(Column::FileHash.eq(hash))
            .filter(Column::IsDeleted.eq(false))
            .order_by_asc(Column::Id)
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("查询文件失败: {e}")))?;

        Ok(result.map(|m| m.into_file()))
    }

    /// 任务下未删除文件的数量与总大小
    pub async fn get_file_statistics_impl(&self, task_id: i64) -> Result<FileStatistics> {
        // SUM 在 PostgreSQL/MySQL 上返回 numeric，转回整数再解码
        let int_type = match self.db.get_database_backend() {
            DbBackend::MySql => "SIGNED",
            _ => "BIGINT",
        };

        let (total_files, total_size) = Files::find()
            .filter(Column::TaskId.eq(task_id))
            .filter(Column::IsDeleted.eq(false))
            .select_only()
            .column_as(Column::Id.count(), "total_files")
            .column_as(
                Column::FileSize.sum().cast_as(Alias::new(int_type)),
                "total_size",
            )
            .into_tuple::<(i64, Option<i64>)>()
            .one(&self.db)
            .await
            .map_err(|e| TaskDropError::database_operation(format!("统计文件失败: {e}")))?
            .unwrap_or((0, None));

        Ok(FileStatistics {
            total_files,
            total_size: total_size.unwrap_or(0),
        })
    }
}
