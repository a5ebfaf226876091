pub mod prelude;

pub mod api_keys;
pub mod github_tokens;
pub mod job_runs;
pub mod module_github_sync;
pub mod modules;
pub mod ratings;
pub mod releases;
pub mod replies;
pub mod system_logs;
pub mod users;
