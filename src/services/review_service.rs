//! Domain service for admin vetting and catalogue maintenance.

use serde::Serialize;

use crate::domain::{Actor, ModuleId, ModuleStatus};
use crate::models::module::{Module, ModulePatch, ModuleSummary};
use crate::models::release::{NewRelease, Release, ReleasePatch};
use crate::services::module_service::{ModuleDetail, ModuleError};

/// Review queue counters for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewStats {
    pub pending: i64,
    pub approved: i64,
    pub declined: i64,
    pub published: u64,
}

#[async_trait::async_trait]
pub trait ReviewService: Send + Sync {
    /// All modules regardless of state, newest first.
    async fn list(
        &self,
        status: Option<ModuleStatus>,
        query: Option<&str>,
    ) -> Result<Vec<ModuleSummary>, ModuleError>;

    async fn get(&self, id: ModuleId) -> Result<ModuleDetail, ModuleError>;

    /// Marks a module approved. It is published unless `publish` is false.
    async fn approve(
        &self,
        actor: &Actor,
        id: ModuleId,
        publish: bool,
        notes: Option<String>,
    ) -> Result<Module, ModuleError>;

    /// Marks a module declined and unpublished, keeping the reason for the submitter.
    async fn decline(
        &self,
        actor: &Actor,
        id: ModuleId,
        reason: String,
    ) -> Result<Module, ModuleError>;

    async fn update(
        &self,
        actor: &Actor,
        id: ModuleId,
        patch: ModulePatch,
    ) -> Result<Module, ModuleError>;

    /// Hard delete, cascading to releases, ratings, replies and sync config.
    async fn delete(&self, actor: &Actor, id: ModuleId) -> Result<(), ModuleError>;

    /// # Errors
    ///
    /// Returns [`ModuleError::Conflict`] when the module already has this version.
    async fn add_release(
        &self,
        actor: &Actor,
        module_id: ModuleId,
        release: NewRelease,
        mark_latest: bool,
    ) -> Result<Release, ModuleError>;

    async fn update_release(&self, id: i32, patch: ReleasePatch) -> Result<Release, ModuleError>;

    async fn delete_release(&self, id: i32) -> Result<(), ModuleError>;

    async fn set_latest_release(&self, id: i32) -> Result<Release, ModuleError>;

    async fn stats(&self) -> Result<ReviewStats, ModuleError>;
}
