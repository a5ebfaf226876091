//! GitHub release lookup, personal access tokens and per-module sync settings.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::Validator;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::clients::github::GithubRelease;
use crate::domain::ModuleId;
use crate::models::github::GithubSyncConfig;
use crate::services::{SyncOutcome, TokenStatus};

#[derive(Debug, Deserialize)]
pub struct ReleasesQuery {
    pub repo: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncConfigRequest {
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub include_prereleases: bool,
}

const fn default_enabled() -> bool {
    true
}

/// GET /github/releases?repo=owner/name
/// Lists a repository's releases, with the caller's PAT when they saved one
pub async fn list_releases(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ReleasesQuery>,
) -> Result<Json<ApiResponse<Vec<GithubRelease>>>, ApiError> {
    let releases = state
        .github_sync()
        .list_releases_for_user(current.actor.id, &query.repo)
        .await?;
    Ok(Json(ApiResponse::success(releases)))
}

/// GET /github/token
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<TokenStatus>>, ApiError> {
    let status = state.github_sync().token_status(current.actor.id).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// PUT /github/token
pub async fn save_token(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<SaveTokenRequest>,
) -> Result<Json<ApiResponse<TokenStatus>>, ApiError> {
    let token = payload.token.trim();

    let mut v = Validator::new();
    v.length("token", "Token", token, 1, 255);
    if token.chars().any(char::is_whitespace) {
        v.push("token", "Token", "Token cannot contain whitespace");
    }
    v.finish()?;

    let status = state
        .github_sync()
        .save_token(current.actor.id, token)
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

/// DELETE /github/token
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if state.github_sync().delete_token(current.actor.id).await? {
        Ok(Json(ApiResponse::success(MessageResponse::new(
            "GitHub token removed",
        ))))
    } else {
        Err(ApiError::NotFound("No GitHub token saved".to_string()))
    }
}

/// GET /admin/modules/{id}/github-sync
pub async fn get_sync_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<GithubSyncConfig>>, ApiError> {
    let config = state.github_sync().get_config(ModuleId::new(id)).await?;
    Ok(Json(ApiResponse::success(config)))
}

/// PUT /admin/modules/{id}/github-sync
/// Accepts `owner/repo` or a github.com URL
pub async fn configure_sync(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<SyncConfigRequest>,
) -> Result<Json<ApiResponse<GithubSyncConfig>>, ApiError> {
    let mut v = Validator::new();
    v.length("repository", "Repository", &payload.repository, 3, 200);
    v.finish()?;

    let config = state
        .github_sync()
        .configure(
            ModuleId::new(id),
            payload.repository.trim(),
            payload.enabled,
            payload.include_prereleases,
        )
        .await?;
    Ok(Json(ApiResponse::success(config)))
}

/// DELETE /admin/modules/{id}/github-sync
pub async fn remove_sync_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.github_sync().remove_config(ModuleId::new(id)).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "GitHub sync removed",
    ))))
}

/// POST /admin/modules/{id}/github-sync/run
/// Syncs one module now and waits for the result
pub async fn run_sync(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SyncOutcome>>, ApiError> {
    let outcome = state
        .github_sync()
        .run_for_module(ModuleId::new(id))
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
