use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{Validator, validate_rating, validate_reply};
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::models::rating::{Rating, RatingSort};

#[derive(Debug, Deserialize)]
pub struct RatingsQuery {
    #[serde(default)]
    pub sort: RatingSort,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

impl RatingRequest {
    fn validated(self) -> Result<(i32, Option<String>), ApiError> {
        let comment = self
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let mut v = Validator::new();
        validate_rating(&mut v, self.rating, comment.as_deref());
        v.finish()?;

        Ok((self.rating, comment))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplyRequest {
    pub comment: String,
}

/// GET /modules/{slug}/ratings
pub async fn list_ratings(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<RatingsQuery>,
) -> Result<Json<ApiResponse<Vec<Rating>>>, ApiError> {
    let ratings = state.rating_service().list(&slug, query.sort).await?;
    Ok(Json(ApiResponse::success(ratings)))
}

/// POST /modules/{slug}/ratings
/// One rating per user and module
pub async fn create_rating(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(payload): Json<RatingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (rating, comment) = payload.validated()?;

    let created = state
        .rating_service()
        .create(&current.actor, &slug, rating, comment)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// PUT /ratings/{id}
pub async fn update_rating(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<ApiResponse<Rating>>, ApiError> {
    let (rating, comment) = payload.validated()?;

    let updated = state
        .rating_service()
        .update(&current.actor, id, rating, comment)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /ratings/{id}
pub async fn delete_rating(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.rating_service().delete(&current.actor, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Rating deleted"))))
}

/// POST /ratings/{id}/helpful
pub async fn mark_helpful(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Rating>>, ApiError> {
    let rating = state.rating_service().mark_helpful(&current.actor, id).await?;
    Ok(Json(ApiResponse::success(rating)))
}

/// POST /ratings/{id}/replies
pub async fn create_reply(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(rating_id): Path<i32>,
    Json(payload): Json<ReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = payload.comment.trim().to_string();

    let mut v = Validator::new();
    validate_reply(&mut v, &comment);
    v.finish()?;

    let reply = state
        .rating_service()
        .reply(&current.actor, rating_id, &comment)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(reply))))
}

/// DELETE /replies/{id}
pub async fn delete_reply(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.rating_service().delete_reply(&current.actor, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Reply deleted"))))
}
