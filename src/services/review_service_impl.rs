//! `SeaORM` implementation of the `ReviewService` trait.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{Actor, ModuleId, ModuleStatus};
use crate::models::module::{Module, ModulePatch, ModuleSummary};
use crate::models::release::{NewRelease, Release, ReleasePatch};
use crate::services::module_service::{ModuleDetail, ModuleError};
use crate::services::module_service_impl::summarize;
use crate::services::review_service::{ReviewService, ReviewStats};

pub struct SeaOrmReviewService {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl SeaOrmReviewService {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { store, event_bus }
    }

    async fn module(&self, id: ModuleId) -> Result<Module, ModuleError> {
        self.store
            .module_repo()
            .get(id)
            .await?
            .ok_or(ModuleError::NotFound)
    }

    async fn release(&self, id: i32) -> Result<Release, ModuleError> {
        self.store
            .release_repo()
            .get(id)
            .await?
            .ok_or(ModuleError::ReleaseNotFound)
    }

    fn emit(&self, event: NotificationEvent) {
        let _ = self.event_bus.send(event);
    }
}

#[async_trait]
impl ReviewService for SeaOrmReviewService {
    async fn list(
        &self,
        status: Option<ModuleStatus>,
        query: Option<&str>,
    ) -> Result<Vec<ModuleSummary>, ModuleError> {
        let modules = self.store.module_repo().list_for_review(status, query).await?;
        summarize(&self.store, modules).await
    }

    async fn get(&self, id: ModuleId) -> Result<ModuleDetail, ModuleError> {
        let module = self.module(id).await?;
        let mut stats = self.store.module_repo().stats_for(&[id.value()]).await?;
        let releases = self.store.release_repo().list_for_module(id).await?;
        Ok(ModuleDetail::new(
            module,
            stats.remove(&id.value()).unwrap_or_default(),
            releases,
        ))
    }

    async fn approve(
        &self,
        actor: &Actor,
        id: ModuleId,
        publish: bool,
        notes: Option<String>,
    ) -> Result<Module, ModuleError> {
        let module = self
            .store
            .module_repo()
            .set_review(id, ModuleStatus::Approved, publish, actor.id, notes)
            .await?
            .ok_or(ModuleError::NotFound)?;

        info!(module_id = %id, reviewer = %actor.username, publish, "Module approved");
        self.emit(NotificationEvent::ModuleApproved {
            module_id: id.value(),
            name: module.name.clone(),
            reviewed_by: actor.username.clone(),
        });

        Ok(module)
    }

    async fn decline(
        &self,
        actor: &Actor,
        id: ModuleId,
        reason: String,
    ) -> Result<Module, ModuleError> {
        let module = self
            .store
            .module_repo()
            .set_review(id, ModuleStatus::Declined, false, actor.id, Some(reason.clone()))
            .await?
            .ok_or(ModuleError::NotFound)?;

        info!(module_id = %id, reviewer = %actor.username, "Module declined");
        self.emit(NotificationEvent::ModuleDeclined {
            module_id: id.value(),
            name: module.name.clone(),
            reviewed_by: actor.username.clone(),
            reason,
        });

        Ok(module)
    }

    async fn update(
        &self,
        actor: &Actor,
        id: ModuleId,
        patch: ModulePatch,
    ) -> Result<Module, ModuleError> {
        let module = self
            .store
            .module_repo()
            .apply_patch(id, &patch)
            .await?
            .ok_or(ModuleError::NotFound)?;

        info!(module_id = %id, editor = %actor.username, "Module updated");
        self.emit(NotificationEvent::ModuleUpdated {
            module_id: id.value(),
            name: module.name.clone(),
        });

        Ok(module)
    }

    async fn delete(&self, actor: &Actor, id: ModuleId) -> Result<(), ModuleError> {
        let module = self.module(id).await?;

        if !self.store.module_repo().delete_cascade(id).await? {
            return Err(ModuleError::NotFound);
        }

        warn!(module_id = %id, slug = %module.slug, actor = %actor.username, "Module deleted");
        self.emit(NotificationEvent::ModuleDeleted {
            module_id: id.value(),
            name: module.name,
        });

        Ok(())
    }

    async fn add_release(
        &self,
        actor: &Actor,
        module_id: ModuleId,
        release: NewRelease,
        mark_latest: bool,
    ) -> Result<Release, ModuleError> {
        self.module(module_id).await?;

        let releases = self.store.release_repo();
        if releases
            .find_by_version(module_id, &release.version)
            .await?
            .is_some()
        {
            return Err(ModuleError::Conflict(format!(
                "Version {} already exists for this module",
                release.version
            )));
        }

        let has_latest = releases.latest_for_module(module_id).await?.is_some();
        let created = releases
            .create(module_id, &release, mark_latest || !has_latest)
            .await?;
        self.store.module_repo().touch_last_updated(module_id).await?;

        info!(module_id = %module_id, version = %created.version, actor = %actor.username, "Release added");
        self.emit(NotificationEvent::ReleaseAdded {
            module_id: module_id.value(),
            version: created.version.clone(),
            source: "manual".to_string(),
        });

        Ok(created)
    }

    async fn update_release(&self, id: i32, patch: ReleasePatch) -> Result<Release, ModuleError> {
        let current = self.release(id).await?;

        if let Some(version) = patch.version.as_deref()
            && version != current.version
            && self
                .store
                .release_repo()
                .find_by_version(current.module_id, version)
                .await?
                .is_some()
        {
            return Err(ModuleError::Conflict(format!(
                "Version {version} already exists for this module"
            )));
        }

        self.store
            .release_repo()
            .update(id, &patch)
            .await?
            .ok_or(ModuleError::ReleaseNotFound)
    }

    async fn delete_release(&self, id: i32) -> Result<(), ModuleError> {
        let removed = self
            .store
            .release_repo()
            .delete(id)
            .await?
            .ok_or(ModuleError::ReleaseNotFound)?;

        info!(release_id = id, module_id = %removed.module_id, version = %removed.version, "Release deleted");
        Ok(())
    }

    async fn set_latest_release(&self, id: i32) -> Result<Release, ModuleError> {
        self.store
            .release_repo()
            .set_latest(id)
            .await?
            .ok_or(ModuleError::ReleaseNotFound)
    }

    async fn stats(&self) -> Result<ReviewStats, ModuleError> {
        let counts = self.store.module_repo().status_counts().await?;
        let count = |status: ModuleStatus| counts.get(status.as_str()).copied().unwrap_or(0);

        Ok(ReviewStats {
            pending: count(ModuleStatus::Pending),
            approved: count(ModuleStatus::Approved),
            declined: count(ModuleStatus::Declined),
            published: self.store.module_repo().count_published().await?,
        })
    }
}
