//! Admin endpoints: the review queue, catalogue maintenance and user roles.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::modules::ReleaseRequest;
use super::validation::{
    Validator, validate_decline_reason, validate_module_patch, validate_release,
    validate_release_patch,
};
use super::{AdminStatsDto, ApiError, ApiResponse, AppState, MessageResponse, UserDto};
use crate::domain::{ModuleId, ModuleStatus, ModuleWarning, UserId, UserRole, WarningKind};
use crate::models::module::{Module, ModulePatch, ModuleSummary};
use crate::models::release::{Release, ReleasePatch};
use crate::services::ModuleDetail;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ModuleListQuery {
    pub status: Option<ModuleStatus>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WarningRequest {
    pub kind: String,
    pub message: String,
}

/// Partial module edit. Absent fields are left alone; an empty `icon_url` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModulePatchRequest {
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
    pub icon_url: Option<String>,
    pub is_open_source: Option<bool>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_recommended: Option<bool>,
    pub warnings: Option<Vec<WarningRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    #[serde(default = "default_publish")]
    pub publish: bool,
    pub notes: Option<String>,
}

const fn default_publish() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeclineRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AddReleaseRequest {
    #[serde(flatten)]
    pub release: ReleaseRequest,
    #[serde(default)]
    pub mark_latest: bool,
}

/// Absent fields are left alone; an empty `changelog` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReleasePatchRequest {
    pub version: Option<String>,
    pub download_url: Option<String>,
    pub changelog: Option<String>,
    pub size_bytes: Option<i64>,
    pub is_latest: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RoleRequest {
    pub role: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AdminStatsDto>>, ApiError> {
    let review = state.review_service().stats().await?;
    let site = state.module_service().site_stats().await?;

    Ok(Json(ApiResponse::success(AdminStatsDto {
        pending: review.pending,
        approved: review.approved,
        declined: review.declined,
        published: review.published,
        users: site.users,
        ratings: site.ratings,
        downloads: site.downloads,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
    })))
}

/// GET /admin/modules?status=&q=
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModuleListQuery>,
) -> Result<Json<ApiResponse<Vec<ModuleSummary>>>, ApiError> {
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let modules = state.review_service().list(query.status, q).await?;
    Ok(Json(ApiResponse::success(modules)))
}

/// GET /admin/modules/{id}
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ModuleDetail>>, ApiError> {
    let detail = state.review_service().get(ModuleId::new(id)).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// PATCH /admin/modules/{id}
pub async fn update_module(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<ModulePatchRequest>,
) -> Result<Json<ApiResponse<Module>>, ApiError> {
    let mut v = Validator::new();
    let patch = build_module_patch(&mut v, payload);
    validate_module_patch(&mut v, &patch);
    v.finish()?;

    let module = state
        .review_service()
        .update(&current.actor, ModuleId::new(id), patch)
        .await?;
    Ok(Json(ApiResponse::success(module)))
}

/// DELETE /admin/modules/{id}
/// Removes the module with its releases, ratings and sync settings
pub async fn delete_module(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .review_service()
        .delete(&current.actor, ModuleId::new(id))
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Module deleted"))))
}

/// POST /admin/modules/{id}/approve
pub async fn approve_module(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<ApproveRequest>,
) -> Result<Json<ApiResponse<Module>>, ApiError> {
    let notes = payload
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let mut v = Validator::new();
    if let Some(notes) = &notes {
        v.max_length("notes", "Notes", notes, 1000);
    }
    v.finish()?;

    let module = state
        .review_service()
        .approve(&current.actor, ModuleId::new(id), payload.publish, notes)
        .await?;
    Ok(Json(ApiResponse::success(module)))
}

/// POST /admin/modules/{id}/decline
pub async fn decline_module(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<DeclineRequest>,
) -> Result<Json<ApiResponse<Module>>, ApiError> {
    let reason = payload.reason.trim().to_string();

    let mut v = Validator::new();
    validate_decline_reason(&mut v, &reason);
    v.finish()?;

    let module = state
        .review_service()
        .decline(&current.actor, ModuleId::new(id), reason)
        .await?;
    Ok(Json(ApiResponse::success(module)))
}

/// POST /admin/modules/{id}/releases
pub async fn add_release(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<AddReleaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let release = payload.release.into_release();

    let mut v = Validator::new();
    validate_release(&mut v, "", &release);
    v.finish()?;

    let created = state
        .review_service()
        .add_release(&current.actor, ModuleId::new(id), release, payload.mark_latest)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// PUT /admin/releases/{id}
pub async fn update_release(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<ReleasePatchRequest>,
) -> Result<Json<ApiResponse<Release>>, ApiError> {
    let patch = ReleasePatch {
        version: payload.version.map(|s| s.trim().to_string()),
        download_url: payload.download_url.map(|s| s.trim().to_string()),
        changelog: payload.changelog.map(|c| {
            let c = c.trim().to_string();
            (!c.is_empty()).then_some(c)
        }),
        size_bytes: payload.size_bytes.map(Some),
        is_latest: payload.is_latest,
    };

    let mut v = Validator::new();
    validate_release_patch(&mut v, &patch);
    v.finish()?;

    let release = state.review_service().update_release(id, patch).await?;
    Ok(Json(ApiResponse::success(release)))
}

/// DELETE /admin/releases/{id}
pub async fn delete_release(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.review_service().delete_release(id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Release deleted"))))
}

/// POST /admin/releases/{id}/latest
pub async fn set_latest_release(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Release>>, ApiError> {
    let release = state.review_service().set_latest_release(id).await?;
    Ok(Json(ApiResponse::success(release)))
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let users = state.auth_service().list_users().await?;
    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// PUT /admin/users/{id}/role
pub async fn set_user_role(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<RoleRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let role = payload.role.trim();
    let mut v = Validator::new();
    v.one_of("role", "Role", role, &["admin", "user"]);
    v.finish()?;
    let role: UserRole = role
        .parse()
        .map_err(|_| ApiError::validation("Unknown role"))?;

    let user = state
        .auth_service()
        .set_role(&current.actor, UserId::new(id), role)
        .await?;
    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

// ============================================================================
// Helpers
// ============================================================================

fn build_module_patch(v: &mut Validator, payload: ModulePatchRequest) -> ModulePatch {
    let trimmed = |value: Option<String>| value.map(|s| s.trim().to_string());

    let warnings = payload.warnings.map(|warnings| {
        warnings
            .into_iter()
            .enumerate()
            .filter_map(|(idx, w)| match w.kind.trim().parse::<WarningKind>() {
                Ok(kind) => Some(ModuleWarning {
                    kind,
                    message: w.message.trim().to_string(),
                }),
                Err(_) => {
                    v.one_of(
                        format!("warnings[{idx}].kind"),
                        "Warning kind",
                        w.kind.trim(),
                        &["info", "caution", "danger"],
                    );
                    None
                }
            })
            .collect()
    });

    ModulePatch {
        name: trimmed(payload.name),
        short_description: trimmed(payload.short_description),
        description: trimmed(payload.description),
        author: trimmed(payload.author),
        category: trimmed(payload.category),
        license: trimmed(payload.license),
        android_versions: payload.android_versions,
        root_methods: payload.root_methods,
        features: payload
            .features
            .map(|f| f.into_iter().map(|s| s.trim().to_string()).collect()),
        source_url: trimmed(payload.source_url),
        icon_url: payload.icon_url.map(|url| {
            let url = url.trim().to_string();
            (!url.is_empty()).then_some(url)
        }),
        is_open_source: payload.is_open_source,
        is_published: payload.is_published,
        is_featured: payload.is_featured,
        is_recommended: payload.is_recommended,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_clears_icon_and_flags_bad_warning_kind() {
        let mut v = Validator::new();
        let patch = build_module_patch(
            &mut v,
            ModulePatchRequest {
                icon_url: Some("  ".to_string()),
                warnings: Some(vec![
                    WarningRequest {
                        kind: "danger".to_string(),
                        message: "Bootloops on One UI 6".to_string(),
                    },
                    WarningRequest {
                        kind: "fatal".to_string(),
                        message: "x".to_string(),
                    },
                ]),
                ..ModulePatchRequest::default()
            },
        );

        assert_eq!(patch.icon_url, Some(None));
        assert_eq!(patch.warnings.as_ref().map(Vec::len), Some(1));
        assert!(patch.name.is_none());
        assert!(!v.is_valid());
    }
}
