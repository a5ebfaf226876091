//! Domain service for API keys.
//!
//! Keys look like `rmk_` followed by 40 lowercase hex characters. Only an
//! argon2 hash and the 12-character lookup prefix are stored, so the
//! plaintext is shown exactly once.

use thiserror::Error;

use crate::constants::api_keys::{KEY_PREFIX, KEY_RANDOM_BYTES, LOOKUP_PREFIX_LEN};
use crate::db::User;
use crate::domain::{Actor, ApiScope};
use crate::models::api_key::ApiKeyInfo;

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("API key not found")]
    NotFound,

    #[error("API key is already revoked")]
    AlreadyRevoked,

    #[error("Only admins can create keys with the admin scope")]
    AdminScopeForbidden,

    #[error("API key limit of {0} reached")]
    LimitReached(u64),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ApiKeyError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ApiKeyError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A freshly minted key. `key` is the only copy of the plaintext.
#[derive(Debug, Clone)]
pub struct CreatedKey {
    pub key: String,
    pub info: ApiKeyInfo,
}

/// A key that passed verification, with the user it belongs to.
#[derive(Debug, Clone)]
pub struct VerifiedKey {
    pub user: User,
    pub key: ApiKeyInfo,
}

/// Builds a plaintext key from random bytes.
#[must_use]
pub fn format_key(bytes: &[u8; KEY_RANDOM_BYTES]) -> String {
    let mut key = String::with_capacity(KEY_PREFIX.len() + KEY_RANDOM_BYTES * 2);
    key.push_str(KEY_PREFIX);
    for byte in bytes {
        key.push_str(&format!("{byte:02x}"));
    }
    key
}

/// Returns the lookup prefix when `key` has the expected shape.
#[must_use]
pub fn lookup_prefix(key: &str) -> Option<&str> {
    let body = key.strip_prefix(KEY_PREFIX)?;
    let well_formed = body.len() == KEY_RANDOM_BYTES * 2
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, 'a'..='f'));

    if well_formed {
        key.get(..LOOKUP_PREFIX_LEN)
    } else {
        None
    }
}

#[async_trait::async_trait]
pub trait ApiKeyService: Send + Sync {
    /// Mints a key for `actor`.
    ///
    /// `expires_in_days` of `None` applies the configured default, where 0 means never.
    async fn create(
        &self,
        actor: &Actor,
        name: &str,
        scopes: &[ApiScope],
        expires_in_days: Option<u32>,
    ) -> Result<CreatedKey, ApiKeyError>;

    async fn list_for_user(&self, actor: &Actor) -> Result<Vec<ApiKeyInfo>, ApiKeyError>;

    async fn list_all(&self) -> Result<Vec<ApiKeyInfo>, ApiKeyError>;

    /// One-way revocation. Owners may revoke their own keys, admins any key.
    ///
    /// # Errors
    ///
    /// Returns [`ApiKeyError::AlreadyRevoked`] on a second revoke; the original
    /// `revoked_at` is kept.
    async fn revoke(&self, actor: &Actor, id: i32) -> Result<ApiKeyInfo, ApiKeyError>;

    /// Resolves a plaintext key. Unknown, malformed, revoked and expired keys give `None`.
    async fn verify(&self, key: &str) -> Result<Option<VerifiedKey>, ApiKeyError>;
}
