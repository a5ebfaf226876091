use std::collections::HashMap;

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::domain::{ModuleId, ModuleStatus, UserId};
use crate::entities::{module_github_sync, modules, prelude::*, ratings, releases, replies};
use crate::models::encode_list;
use crate::models::module::{Module, ModuleDraft, ModulePatch, ModuleStats, slugify};
use crate::models::release::NewRelease;

pub struct ModuleRepository {
    conn: DatabaseConnection,
}

impl ModuleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Picks the first free slug among `base`, `base-2`, `base-3`, ...
    async fn unique_slug(&self, name: &str, except: Option<i32>) -> Result<String> {
        let base = slugify(name);

        let mut query = Modules::find()
            .select_only()
            .column(modules::Column::Slug)
            .filter(modules::Column::Slug.starts_with(&base));
        if let Some(id) = except {
            query = query.filter(modules::Column::Id.ne(id));
        }
        let taken: Vec<String> = query
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query existing slugs")?;

        if !taken.contains(&base) {
            return Ok(base);
        }

        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Inserts a pending, unpublished module together with its initial releases.
    /// The first release in the list becomes the latest one.
    pub async fn insert_submission(
        &self,
        draft: &ModuleDraft,
        submitted_by: UserId,
        initial_releases: &[NewRelease],
    ) -> Result<Module> {
        let slug = self.unique_slug(&draft.name, None).await?;
        let now = chrono::Utc::now().to_rfc3339();

        let txn = self.conn.begin().await?;

        let active = modules::ActiveModel {
            slug: Set(slug),
            name: Set(draft.name.clone()),
            short_description: Set(draft.short_description.clone()),
            description: Set(draft.description.clone()),
            author: Set(draft.author.clone()),
            category: Set(draft.category.clone()),
            license: Set(draft.license.clone()),
            android_versions: Set(encode_list(&draft.android_versions)?),
            root_methods: Set(encode_list(&draft.root_methods)?),
            features: Set(encode_list(&draft.features)?),
            source_url: Set(draft.source_url.clone()),
            icon_url: Set(draft.icon_url.clone()),
            is_open_source: Set(draft.is_open_source),
            is_published: Set(false),
            status: Set(ModuleStatus::Pending.as_str().to_string()),
            is_featured: Set(false),
            is_recommended: Set(false),
            warnings: Set("[]".to_string()),
            submitted_by: Set(Some(submitted_by.value())),
            reviewed_by: Set(None),
            review_notes: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            last_updated: Set(now.clone()),
            ..Default::default()
        };
        let model = active
            .insert(&txn)
            .await
            .context("Failed to insert module")?;

        for (idx, release) in initial_releases.iter().enumerate() {
            let row = releases::ActiveModel {
                module_id: Set(model.id),
                version: Set(release.version.clone()),
                download_url: Set(release.download_url.clone()),
                changelog: Set(release.changelog.clone()),
                size_bytes: Set(release.size_bytes),
                downloads: Set(0),
                is_latest: Set(idx == 0),
                github_release_id: Set(release.github_release_id),
                created_at: Set(now.clone()),
                ..Default::default()
            };
            row.insert(&txn)
                .await
                .context("Failed to insert submitted release")?;
        }

        txn.commit().await?;

        Module::try_from(model)
    }

    pub async fn get(&self, id: ModuleId) -> Result<Option<Module>> {
        let model = Modules::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query module by ID")?;

        model.map(Module::try_from).transpose()
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Module>> {
        let model = Modules::find()
            .filter(modules::Column::Slug.eq(slug))
            .one(&self.conn)
            .await
            .context("Failed to query module by slug")?;

        model.map(Module::try_from).transpose()
    }

    pub async fn list_published(&self) -> Result<Vec<Module>> {
        let models = Modules::find()
            .filter(modules::Column::IsPublished.eq(true))
            .filter(modules::Column::Status.eq(ModuleStatus::Approved.as_str()))
            .all(&self.conn)
            .await
            .context("Failed to list published modules")?;

        models.into_iter().map(Module::try_from).collect()
    }

    /// Admin listing, newest first. `query` matches name, author or slug.
    pub async fn list_for_review(
        &self,
        status: Option<ModuleStatus>,
        query: Option<&str>,
    ) -> Result<Vec<Module>> {
        let mut select = Modules::find().order_by_desc(modules::Column::CreatedAt);

        if let Some(status) = status {
            select = select.filter(modules::Column::Status.eq(status.as_str()));
        }

        if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(modules::Column::Name.contains(q))
                    .add(modules::Column::Author.contains(q))
                    .add(modules::Column::Slug.contains(q)),
            );
        }

        let models = select
            .all(&self.conn)
            .await
            .context("Failed to list modules for review")?;

        models.into_iter().map(Module::try_from).collect()
    }

    pub async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Module>> {
        let models = Modules::find()
            .filter(modules::Column::SubmittedBy.eq(owner.value()))
            .order_by_desc(modules::Column::UpdatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list modules by owner")?;

        models.into_iter().map(Module::try_from).collect()
    }

    /// Replaces the submitter-controlled fields and puts the module back in the queue.
    pub async fn resubmit(&self, id: ModuleId, draft: &ModuleDraft) -> Result<Option<Module>> {
        let Some(model) = Modules::find_by_id(id.value()).one(&self.conn).await? else {
            return Ok(None);
        };

        let slug = if model.name == draft.name {
            model.slug.clone()
        } else {
            self.unique_slug(&draft.name, Some(model.id)).await?
        };

        let mut active: modules::ActiveModel = model.into();
        active.slug = Set(slug);
        active.name = Set(draft.name.clone());
        active.short_description = Set(draft.short_description.clone());
        active.description = Set(draft.description.clone());
        active.author = Set(draft.author.clone());
        active.category = Set(draft.category.clone());
        active.license = Set(draft.license.clone());
        active.android_versions = Set(encode_list(&draft.android_versions)?);
        active.root_methods = Set(encode_list(&draft.root_methods)?);
        active.features = Set(encode_list(&draft.features)?);
        active.source_url = Set(draft.source_url.clone());
        active.icon_url = Set(draft.icon_url.clone());
        active.is_open_source = Set(draft.is_open_source);
        active.status = Set(ModuleStatus::Pending.as_str().to_string());
        active.is_published = Set(false);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to resubmit module")?;

        Ok(Some(Module::try_from(model)?))
    }

    /// Records a review decision.
    pub async fn set_review(
        &self,
        id: ModuleId,
        status: ModuleStatus,
        is_published: bool,
        reviewer: UserId,
        notes: Option<String>,
    ) -> Result<Option<Module>> {
        let Some(model) = Modules::find_by_id(id.value()).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: modules::ActiveModel = model.into();
        active.status = Set(status.as_str().to_string());
        active.is_published = Set(is_published);
        active.reviewed_by = Set(Some(reviewer.value()));
        active.review_notes = Set(notes);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to record review")?;

        Ok(Some(Module::try_from(model)?))
    }

    pub async fn apply_patch(&self, id: ModuleId, patch: &ModulePatch) -> Result<Option<Module>> {
        let Some(model) = Modules::find_by_id(id.value()).one(&self.conn).await? else {
            return Ok(None);
        };

        let new_slug = match &patch.name {
            Some(name) if *name != model.name => {
                Some(self.unique_slug(name, Some(model.id)).await?)
            }
            _ => None,
        };

        let mut active: modules::ActiveModel = model.into();

        if let Some(slug) = new_slug {
            active.slug = Set(slug);
        }
        if let Some(name) = &patch.name {
            active.name = Set(name.clone());
        }
        if let Some(v) = &patch.short_description {
            active.short_description = Set(v.clone());
        }
        if let Some(v) = &patch.description {
            active.description = Set(v.clone());
        }
        if let Some(v) = &patch.author {
            active.author = Set(v.clone());
        }
        if let Some(v) = &patch.category {
            active.category = Set(v.clone());
        }
        if let Some(v) = &patch.license {
            active.license = Set(v.clone());
        }
        if let Some(v) = &patch.android_versions {
            active.android_versions = Set(encode_list(v)?);
        }
        if let Some(v) = &patch.root_methods {
            active.root_methods = Set(encode_list(v)?);
        }
        if let Some(v) = &patch.features {
            active.features = Set(encode_list(v)?);
        }
        if let Some(v) = &patch.source_url {
            active.source_url = Set(v.clone());
        }
        if let Some(v) = &patch.icon_url {
            active.icon_url = Set(v.clone());
        }
        if let Some(v) = patch.is_open_source {
            active.is_open_source = Set(v);
        }
        if let Some(v) = patch.is_published {
            active.is_published = Set(v);
        }
        if let Some(v) = patch.is_featured {
            active.is_featured = Set(v);
        }
        if let Some(v) = patch.is_recommended {
            active.is_recommended = Set(v);
        }
        if let Some(v) = &patch.warnings {
            active.warnings = Set(encode_list(v)?);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update module")?;

        Ok(Some(Module::try_from(model)?))
    }

    /// Deletes a module and everything hanging off it. Returns false when it did not exist.
    pub async fn delete_cascade(&self, id: ModuleId) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let rating_ids: Vec<i32> = Ratings::find()
            .select_only()
            .column(ratings::Column::Id)
            .filter(ratings::Column::ModuleId.eq(id.value()))
            .into_tuple()
            .all(&txn)
            .await?;

        if !rating_ids.is_empty() {
            Replies::delete_many()
                .filter(replies::Column::RatingId.is_in(rating_ids))
                .exec(&txn)
                .await?;
        }

        Ratings::delete_many()
            .filter(ratings::Column::ModuleId.eq(id.value()))
            .exec(&txn)
            .await?;

        Releases::delete_many()
            .filter(releases::Column::ModuleId.eq(id.value()))
            .exec(&txn)
            .await?;

        ModuleGithubSync::delete_many()
            .filter(module_github_sync::Column::ModuleId.eq(id.value()))
            .exec(&txn)
            .await?;

        let result = Modules::delete_by_id(id.value()).exec(&txn).await?;

        txn.commit().await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn touch_last_updated(&self, id: ModuleId) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        Modules::update_many()
            .col_expr(modules::Column::LastUpdated, sea_orm::sea_query::Expr::value(now))
            .filter(modules::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to bump last_updated")?;
        Ok(())
    }

    /// Published-module counts keyed by category.
    pub async fn category_counts(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = Modules::find()
            .select_only()
            .column(modules::Column::Category)
            .column_as(modules::Column::Id.count(), "count")
            .filter(modules::Column::IsPublished.eq(true))
            .filter(modules::Column::Status.eq(ModuleStatus::Approved.as_str()))
            .group_by(modules::Column::Category)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count modules per category")?;

        Ok(rows.into_iter().collect())
    }

    pub async fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = Modules::find()
            .select_only()
            .column(modules::Column::Status)
            .column_as(modules::Column::Id.count(), "count")
            .group_by(modules::Column::Status)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count modules per status")?;

        Ok(rows.into_iter().collect())
    }

    pub async fn count_published(&self) -> Result<u64> {
        Ok(Modules::find()
            .filter(modules::Column::IsPublished.eq(true))
            .filter(modules::Column::Status.eq(ModuleStatus::Approved.as_str()))
            .count(&self.conn)
            .await?)
    }

    /// Derived statistics for the given modules. Modules without releases or
    /// ratings get zeroed stats.
    pub async fn stats_for(&self, ids: &[i32]) -> Result<HashMap<i32, ModuleStats>> {
        let mut stats: HashMap<i32, ModuleStats> =
            ids.iter().map(|id| (*id, ModuleStats::default())).collect();
        if ids.is_empty() {
            return Ok(stats);
        }

        let downloads: Vec<(i32, Option<i64>)> = Releases::find()
            .select_only()
            .column(releases::Column::ModuleId)
            .column_as(releases::Column::Downloads.sum(), "downloads")
            .filter(releases::Column::ModuleId.is_in(ids.to_vec()))
            .group_by(releases::Column::ModuleId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to sum release downloads")?;

        for (module_id, total) in downloads {
            if let Some(entry) = stats.get_mut(&module_id) {
                entry.downloads = total.unwrap_or(0);
            }
        }

        let rating_rows: Vec<(i32, Option<i64>, i64)> = Ratings::find()
            .select_only()
            .column(ratings::Column::ModuleId)
            .column_as(ratings::Column::Rating.sum(), "total")
            .column_as(ratings::Column::Id.count(), "count")
            .filter(ratings::Column::ModuleId.is_in(ids.to_vec()))
            .group_by(ratings::Column::ModuleId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to aggregate ratings")?;

        for (module_id, total, count) in rating_rows {
            if let Some(entry) = stats.get_mut(&module_id) {
                entry.review_count = count;
                entry.rating = ModuleStats::average(total.unwrap_or(0), count);
            }
        }

        let latest = Releases::find()
            .filter(releases::Column::ModuleId.is_in(ids.to_vec()))
            .filter(releases::Column::IsLatest.eq(true))
            .all(&self.conn)
            .await
            .context("Failed to query latest releases")?;

        for release in latest {
            if let Some(entry) = stats.get_mut(&release.module_id) {
                entry.latest_version = Some(release.version);
                entry.latest_size_bytes = release.size_bytes;
            }
        }

        Ok(stats)
    }
}
