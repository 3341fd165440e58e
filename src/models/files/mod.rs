pub mod entities;
pub mod responses;

pub use entities::{File, FileDescriptor};
pub use responses::{FileStatistics, FileUploadResponse};
