//! `SeaORM` implementation of the `ModuleService` trait.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::constants::MODULE_CATEGORIES;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{Actor, ModuleId, ModuleStatus};
use crate::models::module::{Module, ModuleDraft, ModuleSummary};
use crate::models::release::{NewRelease, Release};
use crate::services::module_service::{
    CategoryCount, ModuleDetail, ModuleError, ModuleService, SiteStats,
};
use crate::services::search::{self, SearchPage, SearchQuery};

/// Joins modules with their derived stats, keeping the input order.
pub(crate) async fn summarize(
    store: &Store,
    modules: Vec<Module>,
) -> Result<Vec<ModuleSummary>, ModuleError> {
    let ids: Vec<i32> = modules.iter().map(|m| m.id.value()).collect();
    let mut stats = store.module_repo().stats_for(&ids).await?;

    Ok(modules
        .into_iter()
        .map(|module| {
            let module_stats = stats.remove(&module.id.value()).unwrap_or_default();
            ModuleSummary::from_parts(module, module_stats)
        })
        .collect())
}

pub struct SeaOrmModuleService {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl SeaOrmModuleService {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { store, event_bus }
    }
}

#[async_trait]
impl ModuleService for SeaOrmModuleService {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage<ModuleSummary>, ModuleError> {
        let modules = self.store.module_repo().list_published().await?;
        let summaries = summarize(&self.store, modules).await?;
        Ok(search::search(summaries, query))
    }

    async fn get_detail(
        &self,
        slug: &str,
        viewer: Option<&Actor>,
    ) -> Result<ModuleDetail, ModuleError> {
        let module = self.get_visible(slug, viewer).await?;

        let mut stats = self.store.module_repo().stats_for(&[module.id.value()]).await?;
        let module_stats = stats.remove(&module.id.value()).unwrap_or_default();
        let releases = self.store.release_repo().list_for_module(module.id).await?;

        Ok(ModuleDetail::new(module, module_stats, releases))
    }

    async fn get_visible(&self, slug: &str, viewer: Option<&Actor>) -> Result<Module, ModuleError> {
        let module = self
            .store
            .module_repo()
            .get_by_slug(slug)
            .await?
            .ok_or(ModuleError::NotFound)?;

        if module.is_public() || viewer.is_some_and(|v| v.can_manage(module.submitted_by)) {
            Ok(module)
        } else {
            Err(ModuleError::NotFound)
        }
    }

    async fn releases(
        &self,
        slug: &str,
        viewer: Option<&Actor>,
    ) -> Result<Vec<Release>, ModuleError> {
        let module = self.get_visible(slug, viewer).await?;
        Ok(self.store.release_repo().list_for_module(module.id).await?)
    }

    async fn record_download(
        &self,
        slug: &str,
        release_id: i32,
        viewer: Option<&Actor>,
    ) -> Result<Release, ModuleError> {
        let module = self.get_visible(slug, viewer).await?;

        let releases = self.store.release_repo();
        let mut release = releases
            .get(release_id)
            .await?
            .filter(|r| r.module_id == module.id)
            .ok_or(ModuleError::ReleaseNotFound)?;

        releases.increment_downloads(release.id).await?;
        release.downloads += 1;

        Ok(release)
    }

    async fn categories(&self) -> Result<Vec<CategoryCount>, ModuleError> {
        let counts = self.store.module_repo().category_counts().await?;

        Ok(MODULE_CATEGORIES
            .iter()
            .map(|name| CategoryCount {
                name: (*name).to_string(),
                count: counts.get(*name).copied().unwrap_or(0),
            })
            .collect())
    }

    async fn submit(
        &self,
        actor: &Actor,
        draft: ModuleDraft,
        releases: Vec<NewRelease>,
    ) -> Result<Module, ModuleError> {
        let module = self
            .store
            .module_repo()
            .insert_submission(&draft, actor.id, &releases)
            .await?;

        info!(
            module_id = %module.id,
            slug = %module.slug,
            submitted_by = %actor.username,
            releases = releases.len(),
            "Module submitted"
        );
        let _ = self.event_bus.send(NotificationEvent::ModuleSubmitted {
            module_id: module.id.value(),
            name: module.name.clone(),
            submitted_by: actor.username.clone(),
        });

        Ok(module)
    }

    async fn resubmit(
        &self,
        actor: &Actor,
        id: ModuleId,
        draft: ModuleDraft,
    ) -> Result<Module, ModuleError> {
        let modules = self.store.module_repo();
        let existing = modules.get(id).await?.ok_or(ModuleError::NotFound)?;

        if !existing.is_owned_by(actor.id) {
            return Err(ModuleError::Forbidden(
                "You can only resubmit your own modules".to_string(),
            ));
        }
        if existing.status != ModuleStatus::Declined {
            return Err(ModuleError::Conflict(format!(
                "Only declined modules can be resubmitted (current status: {})",
                existing.status
            )));
        }

        let module = modules.resubmit(id, &draft).await?.ok_or(ModuleError::NotFound)?;

        info!(module_id = %module.id, "Module resubmitted");
        let _ = self.event_bus.send(NotificationEvent::ModuleResubmitted {
            module_id: module.id.value(),
            name: module.name.clone(),
        });

        Ok(module)
    }

    async fn list_for_owner(&self, actor: &Actor) -> Result<Vec<ModuleSummary>, ModuleError> {
        let modules = self.store.module_repo().list_by_owner(actor.id).await?;
        summarize(&self.store, modules).await
    }

    async fn site_stats(&self) -> Result<SiteStats, ModuleError> {
        Ok(SiteStats {
            modules: self.store.module_repo().count_published().await?,
            downloads: self.store.release_repo().total_downloads().await?,
            ratings: self.store.rating_repo().count().await?,
            users: self.store.user_repo().count().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UserId, UserRole};

    fn draft(name: &str) -> ModuleDraft {
        ModuleDraft {
            name: name.to_string(),
            short_description: "Does a useful thing".to_string(),
            description: "A longer description of the useful thing".to_string(),
            author: "someone".to_string(),
            category: "Audio".to_string(),
            license: "GPL-3.0".to_string(),
            android_versions: vec!["14".to_string()],
            root_methods: vec!["Magisk".to_string()],
            features: vec![],
            source_url: "https://github.com/someone/thing".to_string(),
            icon_url: None,
            is_open_source: true,
        }
    }

    fn release(version: &str) -> NewRelease {
        NewRelease {
            version: version.to_string(),
            download_url: format!("https://example.com/{version}.zip"),
            changelog: None,
            size_bytes: Some(1024),
            github_release_id: None,
        }
    }

    async fn setup() -> (SeaOrmModuleService, Actor, Actor) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let user = store
            .user_repo()
            .create(
                "dev",
                None,
                "password123",
                UserRole::User,
                &crate::config::SecurityConfig::default(),
            )
            .await
            .unwrap();
        let admin = store.user_repo().get_by_username("admin").await.unwrap().unwrap();

        let owner = Actor {
            id: user.id,
            username: user.username,
            role: UserRole::User,
        };
        let admin = Actor {
            id: admin.id,
            username: admin.username,
            role: UserRole::Admin,
        };
        let (tx, _rx) = broadcast::channel(16);
        (SeaOrmModuleService::new(store, tx), owner, admin)
    }

    #[tokio::test]
    async fn test_pending_module_is_hidden_from_public() {
        let (service, owner, admin) = setup().await;
        let module = service
            .submit(&owner, draft("Audio Boost"), vec![release("v1")])
            .await
            .unwrap();

        assert!(matches!(
            service.get_detail(&module.slug, None).await,
            Err(ModuleError::NotFound)
        ));
        let stranger = Actor {
            id: UserId::new(999),
            username: "stranger".to_string(),
            role: UserRole::User,
        };
        assert!(service.get_detail(&module.slug, Some(&stranger)).await.is_err());

        let detail = service.get_detail(&module.slug, Some(&owner)).await.unwrap();
        assert_eq!(detail.releases.len(), 1);
        assert_eq!(detail.latest_version.as_deref(), Some("v1"));
        assert!(service.get_detail(&module.slug, Some(&admin)).await.is_ok());

        let page = service.search(&SearchQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_resubmit_only_from_declined() {
        let (service, owner, admin) = setup().await;
        let module = service
            .submit(&owner, draft("Audio Boost"), vec![])
            .await
            .unwrap();

        assert!(matches!(
            service.resubmit(&owner, module.id, draft("Audio Boost")).await,
            Err(ModuleError::Conflict(_))
        ));

        service
            .store
            .module_repo()
            .set_review(
                module.id,
                ModuleStatus::Declined,
                false,
                admin.id,
                Some("No source".to_string()),
            )
            .await
            .unwrap();

        assert!(matches!(
            service.resubmit(&admin, module.id, draft("Audio Boost")).await,
            Err(ModuleError::Forbidden(_))
        ));

        let resubmitted = service
            .resubmit(&owner, module.id, draft("Audio Boost Pro"))
            .await
            .unwrap();
        assert_eq!(resubmitted.status, ModuleStatus::Pending);
        assert_eq!(resubmitted.slug, "audio-boost-pro");
        assert!(!resubmitted.is_published);
    }

    #[tokio::test]
    async fn test_download_counts_and_checks_module() {
        let (service, owner, admin) = setup().await;
        let module = service
            .submit(&owner, draft("Audio Boost"), vec![release("v1")])
            .await
            .unwrap();
        let other = service
            .submit(&owner, draft("Other Thing"), vec![release("v9")])
            .await
            .unwrap();
        for id in [module.id, other.id] {
            service
                .store
                .module_repo()
                .set_review(id, ModuleStatus::Approved, true, admin.id, None)
                .await
                .unwrap();
        }

        let releases = service.releases(&module.slug, None).await.unwrap();
        let downloaded = service
            .record_download(&module.slug, releases[0].id, None)
            .await
            .unwrap();
        assert_eq!(downloaded.downloads, 1);

        let foreign = service.releases(&other.slug, None).await.unwrap();
        assert!(matches!(
            service.record_download(&module.slug, foreign[0].id, None).await,
            Err(ModuleError::ReleaseNotFound)
        ));

        let categories = service.categories().await.unwrap();
        let audio = categories.iter().find(|c| c.name == "Audio").unwrap();
        assert_eq!(audio.count, 2);
        assert_eq!(categories.len(), MODULE_CATEGORIES.len());

        let stats = service.site_stats().await.unwrap();
        assert_eq!(stats.modules, 2);
        assert_eq!(stats.downloads, 1);
    }
}
