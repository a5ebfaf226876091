pub mod api_key;
pub mod github_sync;
pub mod github_token;
pub mod job;
pub mod logs;
pub mod module;
pub mod rating;
pub mod release;
pub mod user;
