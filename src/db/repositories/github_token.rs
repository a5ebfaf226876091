use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set,
};

use crate::domain::{UserId, UserRole};
use crate::entities::{github_tokens, prelude::*, users};

pub struct GithubTokenRepository {
    conn: DatabaseConnection,
}

impl GithubTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, user_id: UserId) -> Result<Option<github_tokens::Model>> {
        GithubTokens::find()
            .filter(github_tokens::Column::UserId.eq(user_id.value()))
            .one(&self.conn)
            .await
            .context("Failed to query GitHub token")
    }

    pub async fn set(&self, user_id: UserId, token: &str) -> Result<github_tokens::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let model = if let Some(existing) = self.get(user_id).await? {
            let mut active: github_tokens::ActiveModel = existing.into();
            active.token = Set(token.to_string());
            active.updated_at = Set(now);
            active.update(&self.conn).await?
        } else {
            let active = github_tokens::ActiveModel {
                user_id: Set(user_id.value()),
                token: Set(token.to_string()),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            };
            active.insert(&self.conn).await?
        };

        Ok(model)
    }

    pub async fn delete(&self, user_id: UserId) -> Result<bool> {
        let result = GithubTokens::delete_many()
            .filter(github_tokens::Column::UserId.eq(user_id.value()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Oldest admin-owned token, used by scheduled syncs without a server token.
    pub async fn first_admin_token(&self) -> Result<Option<String>> {
        let token = GithubTokens::find()
            .join(JoinType::InnerJoin, github_tokens::Relation::User.def())
            .filter(users::Column::Role.eq(UserRole::Admin.as_str()))
            .order_by_asc(github_tokens::Column::CreatedAt)
            .one(&self.conn)
            .await
            .context("Failed to query admin GitHub token")?;

        Ok(token.map(|t| t.token))
    }
}
