pub mod logs;
pub use logs::LogService;

pub mod search;
pub use search::{ModuleFilter, SearchPage, SearchQuery, SortKey};

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, Registration};
pub use auth_service_impl::SeaOrmAuthService;

pub mod module_service;
pub mod module_service_impl;
pub use module_service::{CategoryCount, ModuleDetail, ModuleError, ModuleService, SiteStats};
pub use module_service_impl::SeaOrmModuleService;

pub mod review_service;
pub mod review_service_impl;
pub use review_service::{ReviewService, ReviewStats};
pub use review_service_impl::SeaOrmReviewService;

pub mod rating_service;
pub mod rating_service_impl;
pub use rating_service::{RatingError, RatingService};
pub use rating_service_impl::SeaOrmRatingService;

pub mod api_key_service;
pub mod api_key_service_impl;
pub use api_key_service::{ApiKeyError, ApiKeyService, CreatedKey, VerifiedKey};
pub use api_key_service_impl::SeaOrmApiKeyService;

pub mod github_sync;
pub use github_sync::{GithubSyncError, GithubSyncService, SyncOutcome, SyncSummary, TokenStatus};

pub mod jobs;
pub use jobs::{JobError, JobService};
