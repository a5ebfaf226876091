use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::system_logs::Model as SystemLog;
pub use repositories::api_key::RevokeOutcome;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn module_repo(&self) -> repositories::module::ModuleRepository {
        repositories::module::ModuleRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn release_repo(&self) -> repositories::release::ReleaseRepository {
        repositories::release::ReleaseRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn rating_repo(&self) -> repositories::rating::RatingRepository {
        repositories::rating::RatingRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn api_key_repo(&self) -> repositories::api_key::ApiKeyRepository {
        repositories::api_key::ApiKeyRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn github_sync_repo(&self) -> repositories::github_sync::GithubSyncRepository {
        repositories::github_sync::GithubSyncRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn github_token_repo(&self) -> repositories::github_token::GithubTokenRepository {
        repositories::github_token::GithubTokenRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn job_repo(&self) -> repositories::job::JobRepository {
        repositories::job::JobRepository::new(self.conn.clone())
    }

    fn logs_repo(&self) -> repositories::logs::LogRepository {
        repositories::logs::LogRepository::new(self.conn.clone())
    }

    pub async fn add_log(
        &self,
        event_type: &str,
        level: &str,
        message: &str,
        details: Option<String>,
    ) -> Result<()> {
        self.logs_repo()
            .add(event_type, level, message, details)
            .await
    }

    pub async fn get_logs(
        &self,
        page: u64,
        page_size: u64,
        level_filter: Option<String>,
        event_type_filter: Option<String>,
    ) -> Result<(Vec<SystemLog>, u64)> {
        self.logs_repo()
            .get_logs(page, page_size, level_filter, event_type_filter)
            .await
    }

    pub async fn clear_logs(&self) -> Result<u64> {
        self.logs_repo().clear_logs().await
    }

    pub async fn prune_logs(&self, older_than_days: i64) -> Result<u64> {
        self.logs_repo().prune_logs(older_than_days).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::domain::{ApiScope, ModuleId, ModuleStatus, UserRole};
    use crate::models::module::ModuleDraft;
    use crate::models::release::{NewRelease, ReleasePatch};

    async fn memory_store() -> Store {
        Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap()
    }

    fn fast_security() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    fn draft(name: &str) -> ModuleDraft {
        ModuleDraft {
            name: name.to_string(),
            short_description: "Systemless busybox binaries".to_string(),
            description: "Installs a complete busybox build without touching /system.".to_string(),
            author: "osm0sis".to_string(),
            category: "Utilities".to_string(),
            license: "GPL-2.0".to_string(),
            android_versions: vec!["13".to_string(), "14".to_string()],
            root_methods: vec!["Magisk".to_string()],
            features: vec![],
            source_url: "https://github.com/osm0sis/busybox".to_string(),
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

    #[tokio::test]
    async fn test_seeded_admin_exists() {
        let store = memory_store().await;
        let admin = store.user_repo().get_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(admin.must_change_password);
    }

    #[tokio::test]
    async fn test_slug_collisions_get_suffixes() {
        let store = memory_store().await;
        let owner = store
            .user_repo()
            .create("dev", None, "longpassword", UserRole::User, &fast_security())
            .await
            .unwrap();

        let repo = store.module_repo();
        let first = repo.insert_submission(&draft("Busybox NDK"), owner.id, &[]).await.unwrap();
        let second = repo.insert_submission(&draft("Busybox NDK"), owner.id, &[]).await.unwrap();
        let third = repo.insert_submission(&draft("busybox ndk"), owner.id, &[]).await.unwrap();

        assert_eq!(first.slug, "busybox-ndk");
        assert_eq!(second.slug, "busybox-ndk-2");
        assert_eq!(third.slug, "busybox-ndk-3");
        assert_eq!(first.status, ModuleStatus::Pending);
        assert!(!first.is_published);
    }

    #[tokio::test]
    async fn test_single_latest_release_after_mutations() {
        let store = memory_store().await;
        let owner = store
            .user_repo()
            .create("dev", None, "longpassword", UserRole::User, &fast_security())
            .await
            .unwrap();
        let module = store
            .module_repo()
            .insert_submission(&draft("Latest Test"), owner.id, &[release("v1"), release("v0")])
            .await
            .unwrap();

        let releases = store.release_repo();
        assert_eq!(releases.count_latest(module.id).await.unwrap(), 1);

        let v2 = releases.create(module.id, &release("v2"), true).await.unwrap();
        assert_eq!(releases.count_latest(module.id).await.unwrap(), 1);
        assert_eq!(
            releases.latest_for_module(module.id).await.unwrap().unwrap().id,
            v2.id
        );

        let v1 = releases.find_by_version(module.id, "v1").await.unwrap().unwrap();
        let patch = ReleasePatch {
            is_latest: Some(true),
            ..ReleasePatch::default()
        };
        releases.update(v1.id, &patch).await.unwrap();
        assert_eq!(releases.count_latest(module.id).await.unwrap(), 1);

        releases.delete(v1.id).await.unwrap();
        assert_eq!(releases.count_latest(module.id).await.unwrap(), 1);

        releases.set_latest(v2.id).await.unwrap();
        assert_eq!(releases.count_latest(module.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revoke_is_one_way() {
        let store = memory_store().await;
        let owner = store
            .user_repo()
            .create("dev", None, "longpassword", UserRole::User, &fast_security())
            .await
            .unwrap();
        let keys = store.api_key_repo();
        let key = keys
            .create(owner.id, "ci", "rmk_00000000", "hash", &[ApiScope::Read], None)
            .await
            .unwrap();

        assert_eq!(keys.revoke(key.id).await.unwrap(), RevokeOutcome::Revoked);
        let revoked_at = keys.get(key.id).await.unwrap().unwrap().revoked_at;
        assert!(revoked_at.is_some());

        assert_eq!(keys.revoke(key.id).await.unwrap(), RevokeOutcome::AlreadyRevoked);
        assert_eq!(keys.get(key.id).await.unwrap().unwrap().revoked_at, revoked_at);
        assert_eq!(keys.revoke(9999).await.unwrap(), RevokeOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = memory_store().await;
        let owner = store
            .user_repo()
            .create("dev", None, "longpassword", UserRole::User, &fast_security())
            .await
            .unwrap();
        let module = store
            .module_repo()
            .insert_submission(&draft("Doomed"), owner.id, &[release("1.0")])
            .await
            .unwrap();
        let rating = store
            .rating_repo()
            .create(module.id, owner.id, 4, Some("fine".to_string()))
            .await
            .unwrap()
            .unwrap();
        store
            .rating_repo()
            .create_reply(rating.id, owner.id, "thanks")
            .await
            .unwrap();
        store
            .github_sync_repo()
            .upsert(module.id, "o", "r", true, false)
            .await
            .unwrap();

        assert!(store.module_repo().delete_cascade(module.id).await.unwrap());
        assert!(store.module_repo().get(module.id).await.unwrap().is_none());
        assert!(store.rating_repo().get(rating.id).await.unwrap().is_none());
        assert!(
            store
                .release_repo()
                .list_for_module(module.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            store
                .github_sync_repo()
                .get_for_module(module.id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!store.module_repo().delete_cascade(ModuleId::new(999)).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_aggregate_releases_and_ratings() {
        let store = memory_store().await;
        let security = fast_security();
        let users = store.user_repo();
        let a = users
            .create("alice", None, "longpassword", UserRole::User, &security)
            .await
            .unwrap();
        let b = users
            .create("bob", None, "longpassword", UserRole::User, &security)
            .await
            .unwrap();
        let c = users
            .create("carol", None, "longpassword", UserRole::User, &security)
            .await
            .unwrap();

        let module = store
            .module_repo()
            .insert_submission(&draft("Stats"), a.id, &[release("2.0"), release("1.0")])
            .await
            .unwrap();
        let releases = store.release_repo().list_for_module(module.id).await.unwrap();
        for r in &releases {
            store.release_repo().increment_downloads(r.id).await.unwrap();
        }

        let ratings = store.rating_repo();
        ratings.create(module.id, a.id, 5, None).await.unwrap();
        ratings.create(module.id, b.id, 4, None).await.unwrap();
        ratings.create(module.id, c.id, 5, None).await.unwrap();

        let stats = store.module_repo().stats_for(&[module.id.value()]).await.unwrap();
        let stats = &stats[&module.id.value()];
        assert_eq!(stats.downloads, 2);
        assert_eq!(stats.review_count, 3);
        assert!((stats.rating - 4.7).abs() < f64::EPSILON);
        assert_eq!(stats.latest_version.as_deref(), Some("2.0"));
    }

    #[tokio::test]
    async fn test_duplicate_rating_insert_is_reported_not_raised() {
        let store = memory_store().await;
        let user = store
            .user_repo()
            .create("dave", None, "longpassword", UserRole::User, &fast_security())
            .await
            .unwrap();
        let module = store
            .module_repo()
            .insert_submission(&draft("Twice"), user.id, &[release("1.0")])
            .await
            .unwrap();

        let ratings = store.rating_repo();
        let first = ratings.create(module.id, user.id, 4, None).await.unwrap().unwrap();

        let second = ratings
            .create(module.id, user.id, 1, Some("changed my mind".to_string()))
            .await
            .unwrap();
        assert!(second.is_none());

        let kept = ratings.find_by_user(module.id, user.id).await.unwrap();
        assert_eq!(kept, Some(first.id));
    }

    #[tokio::test]
    async fn test_sync_error_log_is_bounded() {
        let store = memory_store().await;
        let owner = store
            .user_repo()
            .create("dev", None, "longpassword", UserRole::User, &fast_security())
            .await
            .unwrap();
        let module = store
            .module_repo()
            .insert_submission(&draft("Synced"), owner.id, &[])
            .await
            .unwrap();
        let sync = store.github_sync_repo();
        sync.upsert(module.id, "o", "r", true, false).await.unwrap();

        for n in 0..13 {
            sync.record_failure(module.id, &format!("boom {n}"), 10).await.unwrap();
        }

        let config = sync.get_for_module(module.id).await.unwrap().unwrap();
        assert_eq!(config.sync_errors.len(), 10);
        assert_eq!(config.sync_errors.last().unwrap().message, "boom 12");
        assert!(config.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_prune_logs_with_huge_window_keeps_everything() {
        let store = memory_store().await;
        store
            .add_log("ModuleSubmitted", "info", "Busybox submitted", None)
            .await
            .unwrap();

        assert_eq!(store.prune_logs(i64::from(u32::MAX)).await.unwrap(), 0);
        assert_eq!(store.prune_logs(i64::MAX).await.unwrap(), 0);

        let (logs, _) = store.get_logs(1, 10, None, None).await.unwrap();
        assert_eq!(logs.len(), 1);

        assert_eq!(store.prune_logs(0).await.unwrap(), 1);
    }
}
