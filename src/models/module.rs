use serde::Serialize;

use crate::domain::{ModuleId, ModuleStatus, ModuleWarning, UserId};
use crate::entities::modules;

use super::decode_list;

#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub id: ModuleId,
    pub slug: String,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub author: String,
    pub category: String,
    pub license: String,
    pub android_versions: Vec<String>,
    pub root_methods: Vec<String>,
    pub features: Vec<String>,
    pub source_url: String,
    pub icon_url: Option<String>,
    pub is_open_source: bool,
    pub is_published: bool,
    pub status: ModuleStatus,
    pub is_featured: bool,
    pub is_recommended: bool,
    pub warnings: Vec<ModuleWarning>,
    pub submitted_by: Option<UserId>,
    pub reviewed_by: Option<UserId>,
    pub review_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_updated: String,
}

impl Module {
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.submitted_by == Some(user)
    }

    /// Listed in the public catalogue.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.is_published && self.status == ModuleStatus::Approved
    }
}

impl TryFrom<modules::Model> for Module {
    type Error = anyhow::Error;

    fn try_from(model: modules::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ModuleId::new(model.id),
            android_versions: decode_list(&model.android_versions, "android_versions")?,
            root_methods: decode_list(&model.root_methods, "root_methods")?,
            features: decode_list(&model.features, "features")?,
            warnings: decode_list(&model.warnings, "warnings")?,
            status: model.status.parse()?,
            slug: model.slug,
            name: model.name,
            short_description: model.short_description,
            description: model.description,
            author: model.author,
            category: model.category,
            license: model.license,
            source_url: model.source_url,
            icon_url: model.icon_url,
            is_open_source: model.is_open_source,
            is_published: model.is_published,
            is_featured: model.is_featured,
            is_recommended: model.is_recommended,
            submitted_by: model.submitted_by.map(UserId::new),
            reviewed_by: model.reviewed_by.map(UserId::new),
            review_notes: model.review_notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
            last_updated: model.last_updated,
        })
    }
}

/// Fields a submitter controls. Used for both first submission and resubmission.
#[derive(Debug, Clone)]
pub struct ModuleDraft {
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub author: String,
    pub category: String,
    pub license: String,
    pub android_versions: Vec<String>,
    pub root_methods: Vec<String>,
    pub features: Vec<String>,
    pub source_url: String,
    pub icon_url: Option<String>,
    pub is_open_source: bool,
}

/// Admin edit. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ModulePatch {
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub license: Option<String>,
    pub android_versions: Option<Vec<String>>,
    pub root_methods: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub source_url: Option<String>,
    pub icon_url: Option<Option<String>>,
    pub is_open_source: Option<bool>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_recommended: Option<bool>,
    pub warnings: Option<Vec<ModuleWarning>>,
}

/// Aggregates computed from releases and ratings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleStats {
    pub downloads: i64,
    pub rating: f64,
    pub review_count: i64,
    pub latest_version: Option<String>,
    pub latest_size_bytes: Option<i64>,
}

impl ModuleStats {
    /// Average of `total` over `count`, rounded to one decimal. Zero when unrated.
    #[must_use]
    pub fn average(total: i64, count: i64) -> f64 {
        if count <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let avg = total as f64 / count as f64;
        (avg * 10.0).round() / 10.0
    }
}

/// Listing row: the module joined with its derived statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub id: ModuleId,
    pub slug: String,
    pub name: String,
    pub short_description: String,
    pub author: String,
    pub category: String,
    pub android_versions: Vec<String>,
    pub root_methods: Vec<String>,
    pub icon_url: Option<String>,
    pub is_open_source: bool,
    pub is_featured: bool,
    pub is_recommended: bool,
    pub is_published: bool,
    pub status: ModuleStatus,
    pub warnings: Vec<ModuleWarning>,
    pub downloads: i64,
    pub rating: f64,
    pub review_count: i64,
    pub latest_version: Option<String>,
    pub latest_size_bytes: Option<i64>,
    pub last_updated: String,
}

impl ModuleSummary {
    #[must_use]
    pub fn from_parts(module: Module, stats: ModuleStats) -> Self {
        Self {
            id: module.id,
            slug: module.slug,
            name: module.name,
            short_description: module.short_description,
            author: module.author,
            category: module.category,
            android_versions: module.android_versions,
            root_methods: module.root_methods,
            icon_url: module.icon_url,
            is_open_source: module.is_open_source,
            is_featured: module.is_featured,
            is_recommended: module.is_recommended,
            is_published: module.is_published,
            status: module.status,
            warnings: module.warnings,
            downloads: stats.downloads,
            rating: stats.rating,
            review_count: stats.review_count,
            latest_version: stats.latest_version,
            latest_size_bytes: stats.latest_size_bytes,
            last_updated: module.last_updated,
        }
    }
}

/// Derives a URL slug from a module name.
///
/// Lowercases ASCII alphanumerics and collapses every other run of characters into one `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "module".to_string()
    } else {
        slug
    }
}
