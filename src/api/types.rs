use serde::Serialize;

use super::validation::FieldError;
use crate::db::{SystemLog, User};
use crate::models::api_key::ApiKeyInfo;
use crate::services::CreatedKey;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            fields: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            fields: None,
        }
    }

    pub fn invalid_fields(fields: Vec<FieldError>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some("Validation failed".to_string()),
            fields: Some(fields),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub image: Option<String>,
    pub must_change_password: bool,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id.value(),
            role: user.role.to_string(),
            username: user.username,
            email: user.email,
            image: user.image,
            must_change_password: user.must_change_password,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadDto {
    pub release_id: i32,
    pub version: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct PublicConfigDto {
    pub turnstile_enabled: bool,
    pub turnstile_site_key: Option<String>,
    pub registration_enabled: bool,
    pub categories: Vec<String>,
    pub root_methods: Vec<String>,
    pub android_versions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminStatsDto {
    pub pending: i64,
    pub approved: i64,
    pub declined: i64,
    pub published: u64,
    pub users: u64,
    pub ratings: u64,
    pub downloads: i64,
    pub version: String,
    pub uptime: u64,
}

/// Returned once, at creation. `key` is never retrievable afterwards.
#[derive(Debug, Serialize)]
pub struct CreatedApiKeyDto {
    pub key: String,
    #[serde(flatten)]
    pub info: ApiKeyInfo,
}

impl From<CreatedKey> for CreatedApiKeyDto {
    fn from(created: CreatedKey) -> Self {
        Self {
            key: created.key,
            info: created.info,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogDto {
    pub id: i64,
    pub event_type: String,
    pub level: String,
    pub message: String,
    pub details: Option<String>,
    pub created_at: String,
}

impl From<SystemLog> for LogDto {
    fn from(model: SystemLog) -> Self {
        Self {
            id: model.id,
            event_type: model.event_type,
            level: model.level,
            message: model.message,
            details: model.details,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub logs: Vec<LogDto>,
    pub total_pages: u64,
}
