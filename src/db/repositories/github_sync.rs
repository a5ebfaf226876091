use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::ModuleId;
use crate::entities::{module_github_sync, prelude::*};
use crate::models::encode_list;
use crate::models::github::{GithubSyncConfig, SyncError, push_bounded};

pub struct GithubSyncRepository {
    conn: DatabaseConnection,
}

impl GithubSyncRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn find_model(&self, module_id: ModuleId) -> Result<Option<module_github_sync::Model>> {
        ModuleGithubSync::find()
            .filter(module_github_sync::Column::ModuleId.eq(module_id.value()))
            .one(&self.conn)
            .await
            .context("Failed to query GitHub sync config")
    }

    pub async fn get_for_module(&self, module_id: ModuleId) -> Result<Option<GithubSyncConfig>> {
        self.find_model(module_id)
            .await?
            .map(GithubSyncConfig::try_from)
            .transpose()
    }

    /// Creates or replaces the repository binding. Sync history is kept when the
    /// repository stays the same and reset when it changes.
    pub async fn upsert(
        &self,
        module_id: ModuleId,
        owner: &str,
        repo: &str,
        enabled: bool,
        include_prereleases: bool,
    ) -> Result<GithubSyncConfig> {
        let now = chrono::Utc::now().to_rfc3339();

        let model = if let Some(existing) = self.find_model(module_id).await? {
            let same_repo = existing.owner.eq_ignore_ascii_case(owner)
                && existing.repo.eq_ignore_ascii_case(repo);

            let mut active: module_github_sync::ActiveModel = existing.into();
            active.owner = Set(owner.to_string());
            active.repo = Set(repo.to_string());
            active.enabled = Set(enabled);
            active.include_prereleases = Set(include_prereleases);
            if !same_repo {
                active.last_sync_at = Set(None);
                active.last_release_tag = Set(None);
                active.sync_errors = Set("[]".to_string());
            }
            active.updated_at = Set(now);
            active.update(&self.conn).await?
        } else {
            let active = module_github_sync::ActiveModel {
                module_id: Set(module_id.value()),
                owner: Set(owner.to_string()),
                repo: Set(repo.to_string()),
                enabled: Set(enabled),
                include_prereleases: Set(include_prereleases),
                last_sync_at: Set(None),
                last_release_tag: Set(None),
                sync_errors: Set("[]".to_string()),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            };
            active.insert(&self.conn).await?
        };

        GithubSyncConfig::try_from(model)
    }

    pub async fn delete(&self, module_id: ModuleId) -> Result<bool> {
        let result = ModuleGithubSync::delete_many()
            .filter(module_github_sync::Column::ModuleId.eq(module_id.value()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list_enabled(&self) -> Result<Vec<GithubSyncConfig>> {
        let models = ModuleGithubSync::find()
            .filter(module_github_sync::Column::Enabled.eq(true))
            .order_by_asc(module_github_sync::Column::ModuleId)
            .all(&self.conn)
            .await
            .context("Failed to list enabled sync configs")?;

        models.into_iter().map(GithubSyncConfig::try_from).collect()
    }

    pub async fn record_success(
        &self,
        module_id: ModuleId,
        last_release_tag: Option<String>,
    ) -> Result<()> {
        let Some(model) = self.find_model(module_id).await? else {
            return Ok(());
        };

        let now = chrono::Utc::now().to_rfc3339();
        let mut active: module_github_sync::ActiveModel = model.into();
        active.last_sync_at = Set(Some(now.clone()));
        if last_release_tag.is_some() {
            active.last_release_tag = Set(last_release_tag);
        }
        active.updated_at = Set(now);
        active.update(&self.conn).await?;
        Ok(())
    }

    /// Appends an error, keeping at most `cap` entries.
    pub async fn record_failure(
        &self,
        module_id: ModuleId,
        message: &str,
        cap: usize,
    ) -> Result<()> {
        let Some(model) = self.find_model(module_id).await? else {
            return Ok(());
        };

        let now = chrono::Utc::now().to_rfc3339();
        let config = GithubSyncConfig::try_from(model.clone())?;
        let mut errors = config.sync_errors;
        push_bounded(
            &mut errors,
            SyncError {
                at: now.clone(),
                message: message.to_string(),
            },
            cap,
        );

        let mut active: module_github_sync::ActiveModel = model.into();
        active.sync_errors = Set(encode_list(&errors)?);
        active.last_sync_at = Set(Some(now.clone()));
        active.updated_at = Set(now);
        active.update(&self.conn).await?;
        Ok(())
    }
}
