mod admin;
mod jobs;
mod prune;
mod serve;
mod sync;

pub use admin::cmd_create_admin;
pub use jobs::cmd_jobs;
pub use prune::cmd_prune_logs;
pub use serve::cmd_serve;
pub use sync::cmd_sync;
