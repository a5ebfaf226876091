use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::Expr,
};

use crate::domain::ModuleId;
use crate::entities::{prelude::*, releases};
use crate::models::release::{NewRelease, Release, ReleasePatch};

pub struct ReleaseRepository {
    conn: DatabaseConnection,
}

/// Clears `is_latest` on every release of the module except `keep`.
async fn clear_latest<C: ConnectionTrait>(conn: &C, module_id: i32, keep: i32) -> Result<()> {
    Releases::update_many()
        .col_expr(releases::Column::IsLatest, Expr::value(false))
        .filter(releases::Column::ModuleId.eq(module_id))
        .filter(releases::Column::Id.ne(keep))
        .exec(conn)
        .await
        .context("Failed to clear latest flag on sibling releases")?;
    Ok(())
}

impl ReleaseRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Newest first.
    pub async fn list_for_module(&self, module_id: ModuleId) -> Result<Vec<Release>> {
        let models = Releases::find()
            .filter(releases::Column::ModuleId.eq(module_id.value()))
            .order_by_desc(releases::Column::CreatedAt)
            .order_by_desc(releases::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list releases")?;

        Ok(models.into_iter().map(Release::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Release>> {
        let model = Releases::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query release")?;

        Ok(model.map(Release::from))
    }

    pub async fn find_by_version(
        &self,
        module_id: ModuleId,
        version: &str,
    ) -> Result<Option<Release>> {
        let model = Releases::find()
            .filter(releases::Column::ModuleId.eq(module_id.value()))
            .filter(releases::Column::Version.eq(version))
            .one(&self.conn)
            .await?;

        Ok(model.map(Release::from))
    }

    pub async fn latest_for_module(&self, module_id: ModuleId) -> Result<Option<Release>> {
        let model = Releases::find()
            .filter(releases::Column::ModuleId.eq(module_id.value()))
            .filter(releases::Column::IsLatest.eq(true))
            .one(&self.conn)
            .await?;

        Ok(model.map(Release::from))
    }

    /// All version strings of a module, used by the GitHub sync to skip known tags.
    pub async fn versions_for_module(&self, module_id: ModuleId) -> Result<Vec<String>> {
        let versions: Vec<String> = Releases::find()
            .select_only()
            .column(releases::Column::Version)
            .filter(releases::Column::ModuleId.eq(module_id.value()))
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(versions)
    }

    pub async fn create(
        &self,
        module_id: ModuleId,
        release: &NewRelease,
        mark_latest: bool,
    ) -> Result<Release> {
        let txn = self.conn.begin().await?;

        let active = releases::ActiveModel {
            module_id: Set(module_id.value()),
            version: Set(release.version.clone()),
            download_url: Set(release.download_url.clone()),
            changelog: Set(release.changelog.clone()),
            size_bytes: Set(release.size_bytes),
            downloads: Set(0),
            is_latest: Set(mark_latest),
            github_release_id: Set(release.github_release_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        let model = active
            .insert(&txn)
            .await
            .context("Failed to insert release")?;

        if mark_latest {
            clear_latest(&txn, model.module_id, model.id).await?;
        }

        txn.commit().await?;

        Ok(Release::from(model))
    }

    pub async fn update(&self, id: i32, patch: &ReleasePatch) -> Result<Option<Release>> {
        let txn = self.conn.begin().await?;

        let Some(model) = Releases::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let mut active: releases::ActiveModel = model.into();
        if let Some(version) = &patch.version {
            active.version = Set(version.clone());
        }
        if let Some(url) = &patch.download_url {
            active.download_url = Set(url.clone());
        }
        if let Some(changelog) = &patch.changelog {
            active.changelog = Set(changelog.clone());
        }
        if let Some(size) = patch.size_bytes {
            active.size_bytes = Set(size);
        }
        if let Some(latest) = patch.is_latest {
            active.is_latest = Set(latest);
        }

        let model = active
            .update(&txn)
            .await
            .context("Failed to update release")?;

        if model.is_latest {
            clear_latest(&txn, model.module_id, model.id).await?;
        }

        txn.commit().await?;

        Ok(Some(Release::from(model)))
    }

    /// Removes a release. When it was the latest one, the newest remaining
    /// release takes over the flag.
    pub async fn delete(&self, id: i32) -> Result<Option<Release>> {
        let txn = self.conn.begin().await?;

        let Some(model) = Releases::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        Releases::delete_by_id(id).exec(&txn).await?;

        if model.is_latest {
            let successor = Releases::find()
                .filter(releases::Column::ModuleId.eq(model.module_id))
                .order_by_desc(releases::Column::CreatedAt)
                .order_by_desc(releases::Column::Id)
                .one(&txn)
                .await?;

            if let Some(successor) = successor {
                Releases::update_many()
                    .col_expr(releases::Column::IsLatest, Expr::value(true))
                    .filter(releases::Column::Id.eq(successor.id))
                    .exec(&txn)
                    .await?;
            }
        }

        txn.commit().await?;

        Ok(Some(Release::from(model)))
    }

    pub async fn set_latest(&self, id: i32) -> Result<Option<Release>> {
        let txn = self.conn.begin().await?;

        let Some(model) = Releases::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let mut active: releases::ActiveModel = model.into();
        active.is_latest = Set(true);
        let model = active.update(&txn).await?;

        clear_latest(&txn, model.module_id, model.id).await?;

        txn.commit().await?;

        Ok(Some(Release::from(model)))
    }

    pub async fn increment_downloads(&self, id: i32) -> Result<()> {
        Releases::update_many()
            .col_expr(
                releases::Column::Downloads,
                Expr::col(releases::Column::Downloads).add(1),
            )
            .filter(releases::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to increment download counter")?;
        Ok(())
    }

    pub async fn count_latest(&self, module_id: ModuleId) -> Result<usize> {
        let ids: Vec<i32> = Releases::find()
            .select_only()
            .column(releases::Column::Id)
            .filter(releases::Column::ModuleId.eq(module_id.value()))
            .filter(releases::Column::IsLatest.eq(true))
            .into_tuple()
            .all(&self.conn)
            .await?;
        Ok(ids.len())
    }

    pub async fn total_downloads(&self) -> Result<i64> {
        let total: Option<Option<i64>> = Releases::find()
            .select_only()
            .column_as(releases::Column::Downloads.sum(), "total")
            .into_tuple()
            .one(&self.conn)
            .await?;
        Ok(total.flatten().unwrap_or(0))
    }
}
