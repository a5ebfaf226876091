//! Health, public site configuration and catalogue-wide counters.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, PublicConfigDto};
use crate::constants::{ANDROID_VERSIONS, MODULE_CATEGORIES, ROOT_METHODS};
use crate::services::SiteStats;

pub mod logs;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub version: &'static str,
    pub uptime: u64,
}

/// `GET /api/health`
///
/// Reports 503 when the database does not answer.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let database = state.store().ping().await.is_ok();

    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.start_time.elapsed().as_secs(),
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ApiResponse::success(body))).into_response()
}

/// `GET /api/config/public`
///
/// Settings the browser needs before the user signs in. The Turnstile site key
/// is only exposed while the captcha is enabled.
pub async fn public_config(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<PublicConfigDto>> {
    let config = state.config().read().await;

    let to_owned = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect();

    Json(ApiResponse::success(PublicConfigDto {
        turnstile_enabled: config.turnstile.enabled,
        turnstile_site_key: config
            .turnstile
            .enabled
            .then(|| config.turnstile.site_key.clone())
            .filter(|k| !k.is_empty()),
        registration_enabled: config.server.registration_enabled,
        categories: to_owned(MODULE_CATEGORIES),
        root_methods: to_owned(ROOT_METHODS),
        android_versions: to_owned(ANDROID_VERSIONS),
    }))
}

/// `GET /api/stats`
pub async fn site_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SiteStats>>, ApiError> {
    let stats = state.module_service().site_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
