pub use super::api_keys::Entity as ApiKeys;
pub use super::github_tokens::Entity as GithubTokens;
pub use super::job_runs::Entity as JobRuns;
pub use super::module_github_sync::Entity as ModuleGithubSync;
pub use super::modules::Entity as Modules;
pub use super::ratings::Entity as Ratings;
pub use super::releases::Entity as Releases;
pub use super::replies::Entity as Replies;
pub use super::system_logs::Entity as SystemLogs;
pub use super::users::Entity as Users;
