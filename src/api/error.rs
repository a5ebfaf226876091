use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use super::validation::FieldError;
use crate::clients::github::GithubError;
use crate::services::{
    ApiKeyError, AuthError, GithubSyncError, JobError, ModuleError, RatingError,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    /// Per-field validation failures, reported together.
    InvalidFields(Vec<FieldError>),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::ExternalApiError { service, message } => {
                write!(f, "{} error: {}", service, message)
            }
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::InvalidFields(fields) => {
                write!(f, "Validation failed on {} field(s)", fields.len())
            }
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            ApiError::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{} service is unavailable: {}", service, message),
                )
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InvalidFields(fields) => {
                let body = ApiResponse::<()>::invalid_fields(fields);
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{err:#}"))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(err.to_string()),
            AuthError::RegistrationDisabled => ApiError::Forbidden(err.to_string()),
            AuthError::Conflict(msg) => ApiError::Conflict(msg),
            AuthError::Validation(msg) => ApiError::ValidationError(msg),
            AuthError::Database(msg) => ApiError::DatabaseError(msg),
            AuthError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<ModuleError> for ApiError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::NotFound | ModuleError::ReleaseNotFound => {
                ApiError::NotFound(err.to_string())
            }
            ModuleError::Forbidden(msg) => ApiError::Forbidden(msg),
            ModuleError::Conflict(msg) => ApiError::Conflict(msg),
            ModuleError::Database(msg) => ApiError::DatabaseError(msg),
            ModuleError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<RatingError> for ApiError {
    fn from(err: RatingError) -> Self {
        match err {
            RatingError::ModuleNotFound | RatingError::NotFound | RatingError::ReplyNotFound => {
                ApiError::NotFound(err.to_string())
            }
            RatingError::NotPublished => ApiError::Forbidden(err.to_string()),
            RatingError::AlreadyRated => ApiError::Conflict(err.to_string()),
            RatingError::Forbidden(msg) => ApiError::Forbidden(msg),
            RatingError::Database(msg) => ApiError::DatabaseError(msg),
            RatingError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<ApiKeyError> for ApiError {
    fn from(err: ApiKeyError) -> Self {
        match err {
            ApiKeyError::NotFound => ApiError::NotFound(err.to_string()),
            ApiKeyError::AlreadyRevoked | ApiKeyError::LimitReached(_) => {
                ApiError::Conflict(err.to_string())
            }
            ApiKeyError::AdminScopeForbidden => ApiError::Forbidden(err.to_string()),
            ApiKeyError::Database(msg) => ApiError::DatabaseError(msg),
            ApiKeyError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<GithubSyncError> for ApiError {
    fn from(err: GithubSyncError) -> Self {
        match err {
            GithubSyncError::ModuleNotFound | GithubSyncError::NotConfigured => {
                ApiError::NotFound(err.to_string())
            }
            GithubSyncError::Github(GithubError::InvalidRepository(msg)) => {
                ApiError::ValidationError(format!("Invalid repository: {msg}"))
            }
            GithubSyncError::Github(GithubError::NotFound(repo)) => {
                ApiError::NotFound(format!("Repository {repo} not found"))
            }
            GithubSyncError::Github(e) => ApiError::github_error(e.to_string()),
            GithubSyncError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning(_) => ApiError::Conflict(err.to_string()),
            JobError::NotFound => ApiError::NotFound(err.to_string()),
            JobError::Database(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn github_error(msg: impl Into<String>) -> Self {
        ApiError::ExternalApiError {
            service: "GitHub".to_string(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
