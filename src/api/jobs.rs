use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState};
use crate::domain::JobKind;
use crate::models::job::JobRun;

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub kind: Option<JobKind>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    50
}

/// GET /admin/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<ApiResponse<Vec<JobRun>>>, ApiError> {
    let runs = state.jobs().list(query.kind, query.limit.clamp(1, 200)).await?;
    Ok(Json(ApiResponse::success(runs)))
}

/// GET /admin/jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<JobRun>>, ApiError> {
    let run = state.jobs().get(id).await?;
    Ok(Json(ApiResponse::success(run)))
}

/// POST /admin/jobs/{kind}
/// Starts a job in the background and returns its pending run
pub async fn trigger_job(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind: JobKind = kind
        .parse()
        .map_err(|_| ApiError::not_found("Job", &kind))?;

    let run = state.jobs().trigger(kind, Some(current.actor.id)).await?;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(run))))
}
