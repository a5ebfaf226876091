use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, sea_query::Expr,
};

use crate::domain::{ApiScope, UserId};
use crate::entities::{api_keys, prelude::*};
use crate::models::api_key::ApiKeyInfo;
use crate::models::encode_list;

/// Outcome of a revocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
    NotFound,
}

pub struct ApiKeyRepository {
    conn: DatabaseConnection,
}

impl ApiKeyRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        prefix: &str,
        key_hash: &str,
        scopes: &[ApiScope],
        expires_at: Option<String>,
    ) -> Result<ApiKeyInfo> {
        let active = api_keys::ActiveModel {
            user_id: Set(user_id.value()),
            name: Set(name.to_string()),
            prefix: Set(prefix.to_string()),
            key_hash: Set(key_hash.to_string()),
            scopes: Set(encode_list(scopes)?),
            expires_at: Set(expires_at),
            last_used_at: Set(None),
            revoked_at: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert API key")?;

        ApiKeyInfo::try_from(model)
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ApiKeyInfo>> {
        let models = ApiKeys::find()
            .filter(api_keys::Column::UserId.eq(user_id.value()))
            .order_by_desc(api_keys::Column::CreatedAt)
            .order_by_desc(api_keys::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list API keys")?;

        models.into_iter().map(ApiKeyInfo::try_from).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<ApiKeyInfo>> {
        let models = ApiKeys::find()
            .order_by_desc(api_keys::Column::CreatedAt)
            .order_by_desc(api_keys::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list all API keys")?;

        models.into_iter().map(ApiKeyInfo::try_from).collect()
    }

    pub async fn get(&self, id: i32) -> Result<Option<ApiKeyInfo>> {
        let model = ApiKeys::find_by_id(id).one(&self.conn).await?;
        model.map(ApiKeyInfo::try_from).transpose()
    }

    /// Looks a key up by its display prefix, returning the stored hash alongside.
    pub async fn find_by_prefix(&self, prefix: &str) -> Result<Option<(ApiKeyInfo, String)>> {
        let Some(model) = ApiKeys::find()
            .filter(api_keys::Column::Prefix.eq(prefix))
            .one(&self.conn)
            .await
            .context("Failed to query API key by prefix")?
        else {
            return Ok(None);
        };

        let hash = model.key_hash.clone();
        Ok(Some((ApiKeyInfo::try_from(model)?, hash)))
    }

    pub async fn prefix_exists(&self, prefix: &str) -> Result<bool> {
        let count = ApiKeys::find()
            .filter(api_keys::Column::Prefix.eq(prefix))
            .count(&self.conn)
            .await?;
        Ok(count > 0)
    }

    /// Keys that are neither revoked nor expired.
    pub async fn count_active_for_user(&self, user_id: UserId) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();
        Ok(ApiKeys::find()
            .filter(api_keys::Column::UserId.eq(user_id.value()))
            .filter(api_keys::Column::RevokedAt.is_null())
            .filter(
                Condition::any()
                    .add(api_keys::Column::ExpiresAt.is_null())
                    .add(api_keys::Column::ExpiresAt.gt(now)),
            )
            .count(&self.conn)
            .await?)
    }

    pub async fn touch_last_used(&self, id: i32) -> Result<()> {
        ApiKeys::update_many()
            .col_expr(
                api_keys::Column::LastUsedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(api_keys::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Sets `revoked_at` only when it is still empty, so a revoked key stays revoked
    /// with its original timestamp.
    pub async fn revoke(&self, id: i32) -> Result<RevokeOutcome> {
        let result = ApiKeys::update_many()
            .col_expr(
                api_keys::Column::RevokedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(api_keys::Column::Id.eq(id))
            .filter(api_keys::Column::RevokedAt.is_null())
            .exec(&self.conn)
            .await
            .context("Failed to revoke API key")?;

        if result.rows_affected > 0 {
            return Ok(RevokeOutcome::Revoked);
        }

        let exists = ApiKeys::find_by_id(id).count(&self.conn).await? > 0;
        Ok(if exists {
            RevokeOutcome::AlreadyRevoked
        } else {
            RevokeOutcome::NotFound
        })
    }
}
