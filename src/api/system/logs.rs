use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{ApiError, ApiResponse, AppState, CurrentUser, LogDto, LogResponse};
use crate::domain::events::NotificationEvent;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    pub level: Option<String>,
    pub event_type: Option<String>,
}

const fn default_page() -> u64 {
    1
}

const fn default_page_size() -> u64 {
    50
}

/// GET /admin/logs
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<ApiResponse<LogResponse>>, ApiError> {
    let (logs, total_pages) = state
        .store()
        .get_logs(
            query.page.max(1),
            query.page_size.clamp(1, 500),
            query.level.filter(|l| !l.is_empty()),
            query.event_type.filter(|e| !e.is_empty()),
        )
        .await?;

    let dtos: Vec<LogDto> = logs.into_iter().map(LogDto::from).collect();

    Ok(Json(ApiResponse::success(LogResponse {
        logs: dtos,
        total_pages,
    })))
}

/// DELETE /admin/logs
/// Leaves a single entry recording who cleared the log
pub async fn clear_logs(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<u64>>, ApiError> {
    let removed = state.store().clear_logs().await?;
    tracing::info!(removed, actor = %current.actor.username, "System logs cleared");

    let _ = state.shared.event_bus.send(NotificationEvent::Info {
        message: format!("{} cleared {removed} log entries", current.actor.username),
    });

    Ok(Json(ApiResponse::success(removed)))
}
