use serde::{Deserialize, Serialize};
use ts_rs::TS;

// 已归档到某次提交下的文件
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/file.ts")]
pub struct File {
    pub id: i64,
    // 上传时的原始文件名
    pub original_name: String,
    // 磁盘上的文件名
    pub stored_name: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub file_path: String,
    // 文件大小（以字节为单位）
    pub file_size: i64,
    pub content_type: String,
    // 内容的 SHA-256
    pub file_hash: String,
    pub submission_id: i64,
    pub student_id: i64,
    pub task_id: i64,
    pub is_deleted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// 已上传文件的描述信息
///
/// 上传接口返回它，提交接口原样带回。核心逻辑只保存描述，不接触文件内容。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/file.ts")]
pub struct FileDescriptor {
    pub original_name: String,
    pub stored_name: String,
    #[serde(default)]
    pub file_path: String,
    pub file_size: i64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub file_hash: String,
}

impl FileDescriptor {
    /// 小写扩展名（带点），没有扩展名时返回 None
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> FileDescriptor {
        FileDescriptor {
            original_name: name.to_string(),
            stored_name: "1-abc.pdf".to_string(),
            file_path: String::new(),
            file_size: 1,
            content_type: String::new(),
            file_hash: String::new(),
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(descriptor("Report.PDF").extension(), Some(".pdf".into()));
        assert_eq!(descriptor("archive.tar.gz").extension(), Some(".gz".into()));
        assert_eq!(descriptor("README").extension(), None);
    }
}
