//! Domain service for the public catalogue and the submitter workflow.
//!
//! Browsing, searching and downloading are public. Submitting and
//! resubmitting need an authenticated [`Actor`].

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Actor, ModuleId};
use crate::models::module::{Module, ModuleDraft, ModuleStats, ModuleSummary};
use crate::models::release::{NewRelease, Release};
use crate::services::search::{SearchPage, SearchQuery};

/// Errors shared by the catalogue and review services.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module not found")]
    NotFound,

    #[error("Release not found")]
    ReleaseNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ModuleError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ModuleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Module page: the module, its derived stats and every release, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDetail {
    #[serde(flatten)]
    pub module: Module,
    pub downloads: i64,
    pub rating: f64,
    pub review_count: i64,
    pub latest_version: Option<String>,
    pub releases: Vec<Release>,
}

impl ModuleDetail {
    #[must_use]
    pub fn new(module: Module, stats: ModuleStats, releases: Vec<Release>) -> Self {
        Self {
            module,
            downloads: stats.downloads,
            rating: stats.rating,
            review_count: stats.review_count,
            latest_version: stats.latest_version,
            releases,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteStats {
    pub modules: u64,
    pub downloads: i64,
    pub ratings: u64,
    pub users: u64,
}

#[async_trait::async_trait]
pub trait ModuleService: Send + Sync {
    /// Filters, sorts and paginates the published catalogue.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage<ModuleSummary>, ModuleError>;

    /// Loads a module by slug. Unpublished modules are only visible to their owner and admins.
    async fn get_detail(
        &self,
        slug: &str,
        viewer: Option<&Actor>,
    ) -> Result<ModuleDetail, ModuleError>;

    /// Same visibility rule as [`ModuleService::get_detail`].
    async fn get_visible(&self, slug: &str, viewer: Option<&Actor>) -> Result<Module, ModuleError>;

    async fn releases(
        &self,
        slug: &str,
        viewer: Option<&Actor>,
    ) -> Result<Vec<Release>, ModuleError>;

    /// Counts a download and returns the release so the caller can hand out its URL.
    async fn record_download(
        &self,
        slug: &str,
        release_id: i32,
        viewer: Option<&Actor>,
    ) -> Result<Release, ModuleError>;

    /// Every known category with its published-module count, zero counts included.
    async fn categories(&self) -> Result<Vec<CategoryCount>, ModuleError>;

    /// Stores a new pending, unpublished submission with its initial releases.
    async fn submit(
        &self,
        actor: &Actor,
        draft: ModuleDraft,
        releases: Vec<NewRelease>,
    ) -> Result<Module, ModuleError>;

    /// Sends a declined module back to review.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Conflict`] unless the module is currently declined.
    async fn resubmit(
        &self,
        actor: &Actor,
        id: ModuleId,
        draft: ModuleDraft,
    ) -> Result<Module, ModuleError>;

    /// The actor's own submissions in every state.
    async fn list_for_owner(&self, actor: &Actor) -> Result<Vec<ModuleSummary>, ModuleError>;

    async fn site_stats(&self) -> Result<SiteStats, ModuleError>;
}
