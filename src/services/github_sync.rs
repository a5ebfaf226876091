//! Imports GitHub releases into module release lists.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::clients::github::{GithubClient, GithubError, GithubRelease, parse_repo, select_releases};
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{ModuleId, UserId};
use crate::models::github::{GithubSyncConfig, mask_token};
use crate::models::release::Release;

#[derive(Debug, Error)]
pub enum GithubSyncError {
    #[error("Module not found")]
    ModuleNotFound,

    #[error("GitHub sync is not configured for this module")]
    NotConfigured,

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for GithubSyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result of syncing one module.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub imported: usize,
    pub latest_tag: Option<String>,
}

/// Totals for a full sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub synced: usize,
    pub imported: usize,
    pub failed: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} synced, {} releases imported, {} failed",
            self.synced, self.imported, self.failed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub configured: bool,
    pub masked: Option<String>,
    pub updated_at: Option<String>,
}

pub struct GithubSyncService {
    store: Store,
    client: GithubClient,
    config: Arc<RwLock<Config>>,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl GithubSyncService {
    #[must_use]
    pub const fn new(
        store: Store,
        client: GithubClient,
        config: Arc<RwLock<Config>>,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            store,
            client,
            config,
            event_bus,
        }
    }

    pub async fn get_config(
        &self,
        module_id: ModuleId,
    ) -> Result<GithubSyncConfig, GithubSyncError> {
        self.store
            .github_sync_repo()
            .get_for_module(module_id)
            .await?
            .ok_or(GithubSyncError::NotConfigured)
    }

    /// Binds a module to a repository given as `owner/repo` or a github.com URL.
    pub async fn configure(
        &self,
        module_id: ModuleId,
        repository: &str,
        enabled: bool,
        include_prereleases: bool,
    ) -> Result<GithubSyncConfig, GithubSyncError> {
        let (owner, repo) = parse_repo(repository)?;

        if self.store.module_repo().get(module_id).await?.is_none() {
            return Err(GithubSyncError::ModuleNotFound);
        }

        let config = self
            .store
            .github_sync_repo()
            .upsert(module_id, &owner, &repo, enabled, include_prereleases)
            .await?;

        info!(module_id = %module_id, repository = %config.repository(), enabled, "GitHub sync configured");
        Ok(config)
    }

    pub async fn remove_config(&self, module_id: ModuleId) -> Result<(), GithubSyncError> {
        if self.store.github_sync_repo().delete(module_id).await? {
            Ok(())
        } else {
            Err(GithubSyncError::NotConfigured)
        }
    }

    /// Token for unattended syncs: the server token, else the oldest admin PAT.
    async fn sync_token(&self) -> anyhow::Result<Option<String>> {
        let configured = self
            .config
            .read()
            .await
            .github
            .token
            .clone()
            .filter(|t| !t.trim().is_empty());

        match configured {
            Some(token) => Ok(Some(token)),
            None => self.store.github_token_repo().first_admin_token().await,
        }
    }

    /// Runs one module's sync with the unattended token.
    pub async fn run_for_module(
        &self,
        module_id: ModuleId,
    ) -> Result<SyncOutcome, GithubSyncError> {
        let token = self.sync_token().await?;
        self.sync_module(module_id, token.as_deref()).await
    }

    /// Imports the releases a module does not have yet.
    ///
    /// Failures are appended to the config's bounded error history before being returned.
    pub async fn sync_module(
        &self,
        module_id: ModuleId,
        token: Option<&str>,
    ) -> Result<SyncOutcome, GithubSyncError> {
        let config = self.get_config(module_id).await?;

        match self.import(&config, token).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                warn!(module_id = %module_id, repository = %config.repository(), error = %message, "GitHub sync failed");

                let cap = self.config.read().await.scheduler.sync_error_history;
                self.store
                    .github_sync_repo()
                    .record_failure(module_id, &message, cap)
                    .await?;

                let _ = self.event_bus.send(NotificationEvent::SyncFailed {
                    module_id: module_id.value(),
                    repository: config.repository(),
                    message,
                });
                Err(e)
            }
        }
    }

    async fn import(
        &self,
        config: &GithubSyncConfig,
        token: Option<&str>,
    ) -> Result<SyncOutcome, GithubSyncError> {
        let fetched = self
            .client
            .list_releases(&config.owner, &config.repo, token)
            .await?;
        let eligible = select_releases(fetched, config.include_prereleases);

        let releases = self.store.release_repo();
        let known: HashSet<String> = releases
            .versions_for_module(config.module_id)
            .await?
            .into_iter()
            .collect();
        let current_latest = releases.latest_for_module(config.module_id).await?;

        let newest_tag = eligible.first().map(|r| r.tag_name.trim().to_string());

        // GitHub lists newest first; insert oldest first so created_at follows release order.
        let mut imported = Vec::new();
        let mut newest_source = None;
        for release in eligible
            .iter()
            .rev()
            .filter(|r| !known.contains(r.tag_name.trim()))
        {
            let created = releases
                .create(config.module_id, &release.to_new_release(), false)
                .await?;
            imported.push(created);
            newest_source = Some(release);
        }

        if let (Some(newest), Some(source)) = (imported.last(), newest_source) {
            let promote = current_latest
                .as_ref()
                .is_none_or(|current| supersedes(&eligible, source, current));
            if promote {
                releases.set_latest(newest.id).await?;
            } else {
                debug!(
                    module_id = %config.module_id,
                    tag = %newest.version,
                    "Imported release is not newer than the current latest"
                );
            }
        }

        self.store
            .github_sync_repo()
            .record_success(config.module_id, newest_tag.clone())
            .await?;

        if !imported.is_empty() {
            self.store
                .module_repo()
                .touch_last_updated(config.module_id)
                .await?;

            for release in &imported {
                let _ = self.event_bus.send(NotificationEvent::ReleaseAdded {
                    module_id: config.module_id.value(),
                    version: release.version.clone(),
                    source: "github".to_string(),
                });
            }
        }

        info!(
            module_id = %config.module_id,
            repository = %config.repository(),
            imported = imported.len(),
            "GitHub sync finished"
        );

        Ok(SyncOutcome {
            imported: imported.len(),
            latest_tag: newest_tag,
        })
    }

    /// Syncs every enabled config, at most `scheduler.max_concurrent_syncs` at a time.
    pub async fn sync_all(&self) -> anyhow::Result<SyncSummary> {
        let configs = self.store.github_sync_repo().list_enabled().await?;
        let token = self.sync_token().await?;
        let concurrency = self.config.read().await.scheduler.max_concurrent_syncs.max(1);

        debug!(count = configs.len(), concurrency, authenticated = token.is_some(), "Starting GitHub sync pass");

        let token = token.as_deref();
        let results: Vec<Result<SyncOutcome, GithubSyncError>> = stream::iter(configs)
            .map(|config| async move { self.sync_module(config.module_id, token).await })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = SyncSummary::default();
        for result in results {
            match result {
                Ok(outcome) => {
                    summary.synced += 1;
                    summary.imported += outcome.imported;
                }
                Err(_) => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    /// Release lookup for a user, authenticated with their PAT when they saved one.
    pub async fn list_releases_for_user(
        &self,
        user: UserId,
        repository: &str,
    ) -> Result<Vec<GithubRelease>, GithubSyncError> {
        let (owner, repo) = parse_repo(repository)?;

        let token = match self.store.github_token_repo().get(user).await? {
            Some(saved) => Some(saved.token),
            None => self.config.read().await.github.token.clone(),
        };

        let releases = self.client.list_releases(&owner, &repo, token.as_deref()).await?;
        Ok(select_releases(releases, true))
    }

    pub async fn token_status(&self, user: UserId) -> Result<TokenStatus, GithubSyncError> {
        let saved = self.store.github_token_repo().get(user).await?;
        Ok(TokenStatus {
            configured: saved.is_some(),
            masked: saved.as_ref().map(|t| mask_token(&t.token)),
            updated_at: saved.map(|t| t.updated_at),
        })
    }

    pub async fn save_token(
        &self,
        user: UserId,
        token: &str,
    ) -> Result<TokenStatus, GithubSyncError> {
        let saved = self.store.github_token_repo().set(user, token.trim()).await?;
        info!(user_id = %user, "Saved GitHub token");
        Ok(TokenStatus {
            configured: true,
            masked: Some(mask_token(&saved.token)),
            updated_at: Some(saved.updated_at),
        })
    }

    /// Returns false when the user had no token.
    pub async fn delete_token(&self, user: UserId) -> Result<bool, GithubSyncError> {
        Ok(self.store.github_token_repo().delete(user).await?)
    }
}

/// Whether an imported GitHub release is newer than the module's current latest.
///
/// A latest that is itself one of the repository's tags is compared by GitHub's
/// newest-first order. Anything else is compared by `published_at` against the
/// latest's `created_at`; a release without a publish date never wins.
fn supersedes(eligible: &[GithubRelease], candidate: &GithubRelease, current: &Release) -> bool {
    let position = |tag: &str| eligible.iter().position(|r| r.tag_name.trim() == tag);

    if let (Some(candidate_pos), Some(current_pos)) = (
        position(candidate.tag_name.trim()),
        position(current.version.as_str()),
    ) {
        return candidate_pos < current_pos;
    }

    let published = candidate
        .published_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
    let current_created = DateTime::parse_from_rfc3339(&current.created_at).ok();

    match (published, current_created) {
        (Some(published), Some(created)) => published > created,
        _ => false,
    }
}
