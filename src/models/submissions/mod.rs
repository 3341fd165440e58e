pub mod entities;
pub mod lifecycle;
pub mod requests;
pub mod responses;

pub use entities::{Submission, SubmissionStatus};
