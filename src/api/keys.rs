use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{Validator, validate_api_key_request};
use super::{ApiError, ApiResponse, AppState, CreatedApiKeyDto};
use crate::domain::ApiScope;
use crate::models::api_key::ApiKeyInfo;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateKeyRequest {
    pub name: String,
    /// Kept as strings so unknown scopes come back as field errors.
    pub scopes: Vec<String>,
    pub expires_in_days: Option<u32>,
}

/// GET /keys
pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ApiKeyInfo>>>, ApiError> {
    let keys = state.api_key_service().list_for_user(&current.actor).await?;
    Ok(Json(ApiResponse::success(keys)))
}

/// POST /keys
/// The plaintext key is in this response and nowhere else
pub async fn create_key(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim().to_string();

    let mut v = Validator::new();
    let scopes = parse_scopes(&mut v, &payload.scopes);
    validate_api_key_request(&mut v, &name, &scopes, payload.expires_in_days);
    v.finish()?;

    let created = state
        .api_key_service()
        .create(&current.actor, &name, &scopes, payload.expires_in_days)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreatedApiKeyDto::from(created))),
    ))
}

/// DELETE /keys/{id}
/// Revocation is permanent
pub async fn revoke_key(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ApiKeyInfo>>, ApiError> {
    let key = state.api_key_service().revoke(&current.actor, id).await?;
    Ok(Json(ApiResponse::success(key)))
}

/// GET /admin/keys
pub async fn list_all_keys(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ApiKeyInfo>>>, ApiError> {
    let keys = state.api_key_service().list_all().await?;
    Ok(Json(ApiResponse::success(keys)))
}

fn parse_scopes(v: &mut Validator, raw: &[String]) -> Vec<ApiScope> {
    let mut scopes = Vec::with_capacity(raw.len());
    for (idx, value) in raw.iter().enumerate() {
        match value.trim().to_lowercase().parse::<ApiScope>() {
            Ok(scope) => scopes.push(scope),
            Err(_) => v.push(
                format!("scopes[{idx}]"),
                "Scopes",
                format!("Unknown scope: {value}"),
            ),
        }
    }
    scopes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scopes_flags_unknown_entries() {
        let mut v = Validator::new();
        let scopes = parse_scopes(
            &mut v,
            &["read".to_string(), "Write".to_string(), "delete".to_string()],
        );
        assert_eq!(scopes, vec![ApiScope::Read, ApiScope::Write]);
        match v.finish() {
            Err(ApiError::InvalidFields(fields)) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "scopes[2]");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
