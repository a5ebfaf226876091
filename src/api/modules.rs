//! Public catalogue and the submitter workflow.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{CurrentUser, Viewer};
use super::validation::{
    Validator, validate_module_draft, validate_pagination, validate_submitted_releases,
};
use super::{ApiError, ApiResponse, AppState, DownloadDto};
use crate::constants::limits::DEFAULT_PAGE_SIZE;
use crate::domain::{ModuleId, SortOrder};
use crate::models::module::{Module, ModuleDraft, ModuleSummary};
use crate::models::release::{NewRelease, Release};
use crate::services::{CategoryCount, ModuleDetail, ModuleFilter, SearchPage, SearchQuery, SortKey};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub root_method: Option<String>,
    pub android_version: Option<String>,
    pub min_rating: Option<f64>,
    /// Bytes.
    pub max_size: Option<i64>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub open_source: bool,
    #[serde(default)]
    pub hide_warnings: bool,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// Submitter-controlled module fields. Missing fields become empty and fail validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModuleDraftRequest {
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

impl ModuleDraftRequest {
    fn into_draft(self) -> ModuleDraft {
        ModuleDraft {
            name: self.name.trim().to_string(),
            short_description: self.short_description.trim().to_string(),
            description: self.description.trim().to_string(),
            author: self.author.trim().to_string(),
            category: self.category.trim().to_string(),
            license: self.license.trim().to_string(),
            android_versions: self.android_versions,
            root_methods: self.root_methods,
            features: self.features.into_iter().map(|f| f.trim().to_string()).collect(),
            source_url: self.source_url.trim().to_string(),
            icon_url: non_empty(self.icon_url),
            is_open_source: self.is_open_source,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReleaseRequest {
    pub version: String,
    pub download_url: String,
    pub changelog: Option<String>,
    pub size_bytes: Option<i64>,
}

impl ReleaseRequest {
    pub(super) fn into_release(self) -> NewRelease {
        NewRelease {
            version: self.version.trim().to_string(),
            download_url: self.download_url.trim().to_string(),
            changelog: non_empty(self.changelog),
            size_bytes: self.size_bytes,
            github_release_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitModuleRequest {
    #[serde(flatten)]
    pub module: ModuleDraftRequest,
    #[serde(default)]
    pub releases: Vec<ReleaseRequest>,
    pub turnstile_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResubmitModuleRequest {
    #[serde(flatten)]
    pub module: ModuleDraftRequest,
    pub turnstile_token: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /modules
pub async fn search_modules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchPage<ModuleSummary>>>, ApiError> {
    let query = build_search_query(params)?;
    let page = state.module_service().search(&query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /modules/{slug}
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ModuleDetail>>, ApiError> {
    let detail = state
        .module_service()
        .get_detail(&slug, viewer.actor())
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// GET /modules/{slug}/releases
pub async fn list_releases(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Vec<Release>>>, ApiError> {
    let releases = state
        .module_service()
        .releases(&slug, viewer.actor())
        .await?;
    Ok(Json(ApiResponse::success(releases)))
}

/// POST /modules/{slug}/releases/{id}/download
/// Counts the download and returns the URL to fetch
pub async fn download_release(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path((slug, release_id)): Path<(String, i32)>,
) -> Result<Json<ApiResponse<DownloadDto>>, ApiError> {
    let release = state
        .module_service()
        .record_download(&slug, release_id, viewer.actor())
        .await?;

    Ok(Json(ApiResponse::success(DownloadDto {
        release_id: release.id,
        version: release.version,
        download_url: release.download_url,
    })))
}

/// GET /categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<CategoryCount>>>, ApiError> {
    let categories = state.module_service().categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

/// POST /modules
/// Submit a module for review
pub async fn submit_module(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(payload): Json<SubmitModuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = payload.module.into_draft();
    let releases: Vec<NewRelease> = payload
        .releases
        .into_iter()
        .map(ReleaseRequest::into_release)
        .collect();

    let mut v = Validator::new();
    validate_module_draft(&mut v, &draft);
    validate_submitted_releases(&mut v, &releases);
    v.finish()?;

    verify_captcha(&state, payload.turnstile_token.as_deref(), &headers).await?;

    let module = state
        .module_service()
        .submit(&current.actor, draft, releases)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(module))))
}

/// PUT /modules/{id}/resubmit
/// Send a declined module back to the review queue
pub async fn resubmit_module(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<ResubmitModuleRequest>,
) -> Result<Json<ApiResponse<Module>>, ApiError> {
    let draft = payload.module.into_draft();

    let mut v = Validator::new();
    validate_module_draft(&mut v, &draft);
    v.finish()?;

    verify_captcha(&state, payload.turnstile_token.as_deref(), &headers).await?;

    let module = state
        .module_service()
        .resubmit(&current.actor, ModuleId::new(id), draft)
        .await?;

    Ok(Json(ApiResponse::success(module)))
}

/// GET /me/modules
pub async fn list_my_modules(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ModuleSummary>>>, ApiError> {
    let modules = state.module_service().list_for_owner(&current.actor).await?;
    Ok(Json(ApiResponse::success(modules)))
}

// ============================================================================
// Helpers
// ============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn build_search_query(params: SearchParams) -> Result<SearchQuery, ApiError> {
    let mut v = Validator::new();
    if let Some(min) = params.min_rating
        && !(0.0..=5.0).contains(&min)
    {
        v.push("min_rating", "Minimum rating", "Minimum rating must be between 0 and 5");
    }
    if params.max_size.is_some_and(|s| s < 0) {
        v.push("max_size", "Maximum size", "Maximum size cannot be negative");
    }
    v.finish()?;

    let (page, limit) = validate_pagination(params.page, params.limit, DEFAULT_PAGE_SIZE)?;

    Ok(SearchQuery {
        filter: ModuleFilter {
            query: non_empty(params.q),
            category: non_empty(params.category),
            root_method: non_empty(params.root_method),
            android_version: non_empty(params.android_version),
            min_rating: params.min_rating,
            max_size_bytes: params.max_size,
            featured: params.featured,
            recommended: params.recommended,
            open_source: params.open_source,
            hide_warnings: params.hide_warnings,
        },
        sort: params.sort,
        order: params.order,
        page,
        limit,
    })
}

/// Rejects the request unless the captcha passes or is disabled.
async fn verify_captcha(
    state: &AppState,
    token: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    let config = state.config().read().await.turnstile.clone();
    let remote_ip = client_ip(headers);

    let verdict = state
        .turnstile()
        .verify(&config, token, remote_ip.as_deref())
        .await
        .map_err(|e| ApiError::ExternalApiError {
            service: "Turnstile".to_string(),
            message: format!("{e:#}"),
        })?;

    if verdict.is_allowed() {
        Ok(())
    } else {
        Err(ApiError::validation("Captcha verification failed"))
    }
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
    {
        return Some(ip.trim().to_string());
    }

    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn params() -> SearchParams {
        SearchParams {
            q: None,
            category: None,
            root_method: None,
            android_version: None,
            min_rating: None,
            max_size: None,
            featured: false,
            recommended: false,
            open_source: false,
            hide_warnings: false,
            sort: SortKey::default(),
            order: SortOrder::default(),
            page: None,
            limit: None,
        }
    }

    #[test]
    fn test_blank_params_are_inactive() {
        let mut p = params();
        p.q = Some("   ".to_string());
        p.category = Some(String::new());
        let query = build_search_query(p).unwrap();
        assert!(query.filter.query.is_none());
        assert!(query.filter.category.is_none());
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_out_of_range_params_rejected() {
        let mut p = params();
        p.min_rating = Some(6.0);
        assert!(matches!(build_search_query(p), Err(ApiError::InvalidFields(_))));

        let mut p = params();
        p.limit = Some(101);
        assert!(matches!(build_search_query(p), Err(ApiError::InvalidFields(_))));
    }

    #[test]
    fn test_client_ip_prefers_cloudflare_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.1"));

        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }
}
