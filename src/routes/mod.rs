pub mod auth;

pub mod users;

pub mod tasks;

pub mod submissions;

pub mod files;

pub use auth::configure_auth_routes;
pub use files::configure_file_routes;
pub use submissions::configure_submissions_routes;
pub use tasks::configure_tasks_routes;
pub use users::configure_user_routes;
