use serde::Serialize;

use crate::domain::ModuleId;
use crate::entities::releases;

#[derive(Debug, Clone, Serialize)]
pub struct Release {
    pub id: i32,
    pub module_id: ModuleId,
    pub version: String,
    pub download_url: String,
    pub changelog: Option<String>,
    pub size_bytes: Option<i64>,
    pub downloads: i64,
    pub is_latest: bool,
    pub github_release_id: Option<i64>,
    pub created_at: String,
}

impl From<releases::Model> for Release {
    fn from(model: releases::Model) -> Self {
        Self {
            id: model.id,
            module_id: ModuleId::new(model.module_id),
            version: model.version,
            download_url: model.download_url,
            changelog: model.changelog,
            size_bytes: model.size_bytes,
            downloads: model.downloads,
            is_latest: model.is_latest,
            github_release_id: model.github_release_id,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRelease {
    pub version: String,
    pub download_url: String,
    pub changelog: Option<String>,
    pub size_bytes: Option<i64>,
    pub github_release_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ReleasePatch {
    pub version: Option<String>,
    pub download_url: Option<String>,
    pub changelog: Option<Option<String>>,
    pub size_bytes: Option<Option<i64>>,
    pub is_latest: Option<bool>,
}
