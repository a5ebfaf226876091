use serde::Serialize;

use crate::domain::{ApiScope, UserId};
use crate::entities::api_keys;

use super::decode_list;

/// Everything about a key except its hash.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyInfo {
    pub id: i32,
    pub user_id: UserId,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<ApiScope>,
    pub expires_at: Option<String>,
    pub last_used_at: Option<String>,
    pub revoked_at: Option<String>,
    pub created_at: String,
}

impl ApiKeyInfo {
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Expiry timestamps are RFC 3339 in UTC, so string comparison orders them.
    #[must_use]
    pub fn is_expired(&self, now_rfc3339: &str) -> bool {
        self.expires_at
            .as_deref()
            .is_some_and(|expires| expires <= now_rfc3339)
    }

    #[must_use]
    pub fn has_scope(&self, scope: ApiScope) -> bool {
        self.scopes.contains(&scope) || self.scopes.contains(&ApiScope::Admin)
    }
}

impl TryFrom<api_keys::Model> for ApiKeyInfo {
    type Error = anyhow::Error;

    fn try_from(model: api_keys::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: UserId::new(model.user_id),
            scopes: decode_list(&model.scopes, "scopes")?,
            name: model.name,
            prefix: model.prefix,
            expires_at: model.expires_at,
            last_used_at: model.last_used_at,
            revoked_at: model.revoked_at,
            created_at: model.created_at,
        })
    }
}
