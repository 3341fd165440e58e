use serde::Serialize;
use ts_rs::TS;

use super::entities::FileDescriptor;

/// 上传结果
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/file.ts")]
pub struct FileUploadResponse {
    #[serde(flatten)]
    pub file: FileDescriptor,
    /// 内容相同的已有文件 ID
    pub duplicate_of: Option<i64>,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

/// 任务下未删除文件的汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/file.ts")]
pub struct FileStatistics {
    pub total_files: i64,
    pub total_size: i64,
}
