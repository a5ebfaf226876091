//! Domain service for ratings and their threaded replies.

use thiserror::Error;

use crate::domain::Actor;
use crate::models::rating::{Rating, RatingSort, Reply};

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("Module not found")]
    ModuleNotFound,

    #[error("Rating not found")]
    NotFound,

    #[error("Reply not found")]
    ReplyNotFound,

    #[error("Only published modules can be rated")]
    NotPublished,

    #[error("You have already rated this module")]
    AlreadyRated,

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for RatingError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RatingError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait RatingService: Send + Sync {
    /// Ratings of a published module, each with its replies.
    async fn list(&self, slug: &str, sort: RatingSort) -> Result<Vec<Rating>, RatingError>;

    /// # Errors
    ///
    /// Returns [`RatingError::AlreadyRated`] when the actor already rated this module.
    async fn create(
        &self,
        actor: &Actor,
        slug: &str,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Rating, RatingError>;

    /// Only the author may edit a rating.
    async fn update(
        &self,
        actor: &Actor,
        id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Rating, RatingError>;

    /// The author or an admin may delete a rating. Its replies go with it.
    async fn delete(&self, actor: &Actor, id: i32) -> Result<(), RatingError>;

    /// Adds one helpful vote. Authors cannot vote on their own rating.
    async fn mark_helpful(&self, actor: &Actor, id: i32) -> Result<Rating, RatingError>;

    async fn reply(
        &self,
        actor: &Actor,
        rating_id: i32,
        comment: &str,
    ) -> Result<Reply, RatingError>;

    async fn delete_reply(&self, actor: &Actor, id: i32) -> Result<(), RatingError>;
}
