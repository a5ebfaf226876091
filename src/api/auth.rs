use axum::{
    Extension, Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower_sessions::Session;

use super::validation::{Validator, validate_password, validate_registration};
use super::{ApiError, ApiResponse, AppState, MessageResponse, UserDto};
use crate::constants::session::USER_ID_KEY;
use crate::domain::{Actor, ApiScope, UserId};
use crate::models::api_key::ApiKeyInfo;
use crate::services::{AuthError, Registration};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// How the caller proved who they are.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Session,
    ApiKey(ApiKeyInfo),
}

/// The authenticated caller, stored in request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub actor: Actor,
    pub method: AuthMethod,
}

impl CurrentUser {
    /// Admin role, and for API keys also the `admin` scope.
    #[must_use]
    pub fn has_admin_access(&self) -> bool {
        if !self.actor.is_admin() {
            return false;
        }
        match &self.method {
            AuthMethod::Session => true,
            AuthMethod::ApiKey(key) => key.has_scope(ApiScope::Admin),
        }
    }
}

/// The caller on a public route, if any.
pub struct Viewer(pub Option<CurrentUser>);

impl Viewer {
    #[must_use]
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref().map(|user| &user.actor)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the caller from:
/// 1. `X-Api-Key` header
/// 2. `Authorization: Bearer <api_key>` header
/// 3. Session cookie (from login)
///
/// Anonymous requests pass through. A presented key that does not verify is
/// rejected even on public routes.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(key) = extract_api_key(&headers) {
        let verified = state
            .api_key_service()
            .verify(&key)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid, expired or revoked API key"))?;

        let needed = required_scope(request.method());
        if !verified.key.has_scope(needed) {
            return Err(ApiError::forbidden(format!(
                "API key is missing the {needed} scope"
            )));
        }

        tracing::Span::current().record("user_id", verified.user.id.value());
        request.extensions_mut().insert(CurrentUser {
            actor: verified.user.actor(),
            method: AuthMethod::ApiKey(verified.key),
        });
    } else if let Some(user_id) = session_user_id(&session).await? {
        match state.auth_service().get_user(user_id).await {
            Ok(user) => {
                tracing::Span::current().record("user_id", user.id.value());
                request.extensions_mut().insert(CurrentUser {
                    actor: user.actor(),
                    method: AuthMethod::Session,
                });
            }
            // Account deleted since login.
            Err(AuthError::UserNotFound) => {
                let _ = session.flush().await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(next.run(request).await)
}

/// Route layer for endpoints that need any signed-in caller.
pub async fn require_user(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<CurrentUser>().is_none() {
        return Err(ApiError::unauthorized("Authentication required"));
    }
    Ok(next.run(request).await)
}

/// Route layer for the admin surface.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<CurrentUser>() {
        None => Err(ApiError::unauthorized("Authentication required")),
        Some(user) if !user.has_admin_access() => {
            Err(ApiError::forbidden("Admin access required"))
        }
        Some(_) => Ok(next.run(request).await),
    }
}

fn required_scope(method: &Method) -> ApiScope {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        ApiScope::Read
    } else {
        ApiScope::Write
    }
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

async fn session_user_id(session: &Session) -> Result<Option<UserId>, ApiError> {
    let id = session
        .get::<i32>(USER_ID_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;
    Ok(id.map(UserId::new))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Create a `user` account and sign it in
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim().to_string();
    let email = payload
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    let mut v = Validator::new();
    validate_registration(&mut v, &username, email.as_deref(), &payload.password);
    v.finish()?;

    let user = state
        .auth_service()
        .register(Registration {
            username,
            email,
            password: payload.password,
        })
        .await?;

    start_session(&session, user.id).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(UserDto::from(user)))))
}

/// POST /auth/login
/// Authenticate with username and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .auth_service()
        .login(&payload.username, &payload.password)
        .await?;

    start_session(&session, user.id).await?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/logout
/// Invalidate the current session
pub async fn logout(session: Session) -> Json<ApiResponse<MessageResponse>> {
    let _ = session.flush().await;
    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state.auth_service().get_user(current.actor.id).await?;
    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /auth/password
/// Change password (requires current password verification)
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let mut v = Validator::new();
    validate_password(&mut v, "new_password", &payload.new_password);
    v.finish()?;

    state
        .auth_service()
        .change_password(
            current.actor.id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    tracing::info!(user_id = %current.actor.id, "Password changed");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}

// ============================================================================
// Helpers
// ============================================================================

async fn start_session(session: &Session, user_id: UserId) -> Result<(), ApiError> {
    // New id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;
    session
        .insert(USER_ID_KEY, user_id.value())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;
    use axum::http::HeaderValue;

    fn key(scopes: Vec<ApiScope>) -> ApiKeyInfo {
        ApiKeyInfo {
            id: 1,
            user_id: UserId::new(1),
            name: "ci".to_string(),
            prefix: "rmk_00000000".to_string(),
            scopes,
            expires_at: None,
            last_used_at: None,
            revoked_at: None,
            created_at: "2025-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn user(role: UserRole, method: AuthMethod) -> CurrentUser {
        CurrentUser {
            actor: Actor {
                id: UserId::new(1),
                username: "someone".to_string(),
                role,
            },
            method,
        }
    }

    #[test]
    fn test_extract_api_key_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Api-Key", HeaderValue::from_static("rmk_one"));
        headers.insert("Authorization", HeaderValue::from_static("Bearer rmk_two"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("rmk_one"));

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer  rmk_two "));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("rmk_two"));

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_api_key(&headers), None);
    }

    #[test]
    fn test_required_scope_by_method() {
        assert_eq!(required_scope(&Method::GET), ApiScope::Read);
        assert_eq!(required_scope(&Method::POST), ApiScope::Write);
        assert_eq!(required_scope(&Method::DELETE), ApiScope::Write);
    }

    #[test]
    fn test_admin_access_needs_scope_for_keys() {
        assert!(user(UserRole::Admin, AuthMethod::Session).has_admin_access());
        assert!(!user(UserRole::User, AuthMethod::Session).has_admin_access());
        assert!(
            !user(UserRole::Admin, AuthMethod::ApiKey(key(vec![ApiScope::Write])))
                .has_admin_access()
        );
        assert!(
            user(UserRole::Admin, AuthMethod::ApiKey(key(vec![ApiScope::Admin])))
                .has_admin_access()
        );
        assert!(
            !user(UserRole::User, AuthMethod::ApiKey(key(vec![ApiScope::Admin])))
                .has_admin_access()
        );
    }
}
