use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

use crate::clients::turnstile::TurnstileClient;
use crate::config::Config;
use crate::services::{
    ApiKeyService, AuthService, GithubSyncService, JobService, ModuleService, RatingService,
    ReviewService,
};
use crate::state::SharedState;

mod admin;
pub mod auth;
mod error;
mod github;
mod jobs;
mod keys;
mod modules;
mod observability;
mod ratings;
mod system;
mod types;
pub mod validation;

pub use auth::CurrentUser;
pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn turnstile(&self) -> &TurnstileClient {
        &self.shared.turnstile
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn module_service(&self) -> &Arc<dyn ModuleService> {
        &self.shared.module_service
    }

    #[must_use]
    pub fn review_service(&self) -> &Arc<dyn ReviewService> {
        &self.shared.review_service
    }

    #[must_use]
    pub fn rating_service(&self) -> &Arc<dyn RatingService> {
        &self.shared.rating_service
    }

    #[must_use]
    pub fn api_key_service(&self) -> &Arc<dyn ApiKeyService> {
        &self.shared.api_key_service
    }

    #[must_use]
    pub fn github_sync(&self) -> &Arc<GithubSyncService> {
        &self.shared.github_sync
    }

    #[must_use]
    pub fn jobs(&self) -> &Arc<JobService> {
        &self.shared.jobs
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, secure_cookies, session_minutes) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.server.session_timeout_minutes,
        )
    };

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(session_minutes)));

    let api_router = Router::new()
        .merge(create_public_router())
        .merge(create_protected_router())
        .nest("/admin", create_admin_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

/// Browsing and account entry points. A session or key is resolved when present.
fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(system::health))
        .route("/config/public", get(system::public_config))
        .route("/stats", get(system::site_stats))
        .route("/categories", get(modules::list_categories))
        .route("/modules", get(modules::search_modules))
        .route("/modules/{slug}", get(modules::get_module))
        .route("/modules/{slug}/releases", get(modules::list_releases))
        .route(
            "/modules/{slug}/releases/{id}/download",
            post(modules::download_release),
        )
        .route("/modules/{slug}/ratings", get(ratings::list_ratings))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/metrics",
            get(observability::get_metrics).route_layer(middleware::from_fn(auth::require_admin)),
        )
}

fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/modules", post(modules::submit_module))
        .route("/modules/{slug}/resubmit", put(modules::resubmit_module))
        .route("/me/modules", get(modules::list_my_modules))
        .route("/modules/{slug}/ratings", post(ratings::create_rating))
        .route("/ratings/{id}", put(ratings::update_rating))
        .route("/ratings/{id}", delete(ratings::delete_rating))
        .route("/ratings/{id}/helpful", post(ratings::mark_helpful))
        .route("/ratings/{id}/replies", post(ratings::create_reply))
        .route("/replies/{id}", delete(ratings::delete_reply))
        .route("/keys", get(keys::list_keys))
        .route("/keys", post(keys::create_key))
        .route("/keys/{id}", delete(keys::revoke_key))
        .route("/github/releases", get(github::list_releases))
        .route("/github/token", get(github::get_token))
        .route("/github/token", put(github::save_token))
        .route("/github/token", delete(github::delete_token))
        .route_layer(middleware::from_fn(auth::require_user))
}

fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(admin::get_stats))
        .route("/modules", get(admin::list_modules))
        .route("/modules/{id}", get(admin::get_module))
        .route("/modules/{id}", patch(admin::update_module))
        .route("/modules/{id}", delete(admin::delete_module))
        .route("/modules/{id}/approve", post(admin::approve_module))
        .route("/modules/{id}/decline", post(admin::decline_module))
        .route("/modules/{id}/releases", post(admin::add_release))
        .route("/releases/{id}", put(admin::update_release))
        .route("/releases/{id}", delete(admin::delete_release))
        .route("/releases/{id}/latest", post(admin::set_latest_release))
        .route("/modules/{id}/github-sync", get(github::get_sync_config))
        .route("/modules/{id}/github-sync", put(github::configure_sync))
        .route("/modules/{id}/github-sync", delete(github::remove_sync_config))
        .route("/modules/{id}/github-sync/run", post(github::run_sync))
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::set_user_role))
        .route("/keys", get(keys::list_all_keys))
        .route("/keys/{id}", delete(keys::revoke_key))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{job}", get(jobs::get_job))
        .route("/jobs/{job}", post(jobs::trigger_job))
        .route("/logs", get(system::logs::get_logs))
        .route("/logs", delete(system::logs::clear_logs))
        .route_layer(middleware::from_fn(auth::require_admin))
}
