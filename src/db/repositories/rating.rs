use std::collections::HashMap;

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait, sea_query::Expr,
};

use crate::domain::{ModuleId, UserId};
use crate::entities::{prelude::*, ratings, replies, users};
use crate::models::rating::{Rating, RatingSort, Reply};

pub struct RatingRepository {
    conn: DatabaseConnection,
}

impl RatingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn usernames(&self, ids: Vec<i32>) -> Result<HashMap<i32, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Users::find()
            .filter(users::Column::Id.is_in(ids))
            .all(&self.conn)
            .await
            .context("Failed to resolve usernames")?;

        Ok(rows.into_iter().map(|u| (u.id, u.username)).collect())
    }

    fn map_reply(model: replies::Model, names: &HashMap<i32, String>) -> Reply {
        Reply {
            id: model.id,
            rating_id: model.rating_id,
            user_id: UserId::new(model.user_id),
            username: names.get(&model.user_id).cloned().unwrap_or_default(),
            comment: model.comment,
            created_at: model.created_at,
        }
    }

    fn map_rating(
        model: ratings::Model,
        names: &HashMap<i32, String>,
        replies: Vec<Reply>,
    ) -> Rating {
        Rating {
            id: model.id,
            module_id: ModuleId::new(model.module_id),
            user_id: UserId::new(model.user_id),
            username: names.get(&model.user_id).cloned().unwrap_or_default(),
            rating: model.rating,
            comment: model.comment,
            helpful: model.helpful,
            created_at: model.created_at,
            updated_at: model.updated_at,
            replies,
        }
    }

    async fn hydrate(&self, models: Vec<ratings::Model>) -> Result<Vec<Rating>> {
        let rating_ids: Vec<i32> = models.iter().map(|r| r.id).collect();

        let reply_models = if rating_ids.is_empty() {
            Vec::new()
        } else {
            Replies::find()
                .filter(replies::Column::RatingId.is_in(rating_ids))
                .order_by_asc(replies::Column::CreatedAt)
                .order_by_asc(replies::Column::Id)
                .all(&self.conn)
                .await
                .context("Failed to load replies")?
        };

        let mut user_ids: Vec<i32> = models
            .iter()
            .map(|r| r.user_id)
            .chain(reply_models.iter().map(|r| r.user_id))
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let names = self.usernames(user_ids).await?;

        let mut threads: HashMap<i32, Vec<Reply>> = HashMap::new();
        for reply in reply_models {
            threads
                .entry(reply.rating_id)
                .or_default()
                .push(Self::map_reply(reply, &names));
        }

        Ok(models
            .into_iter()
            .map(|model| {
                let replies = threads.remove(&model.id).unwrap_or_default();
                Self::map_rating(model, &names, replies)
            })
            .collect())
    }

    pub async fn list_for_module(
        &self,
        module_id: ModuleId,
        sort: RatingSort,
    ) -> Result<Vec<Rating>> {
        let mut query = Ratings::find().filter(ratings::Column::ModuleId.eq(module_id.value()));

        query = match sort {
            RatingSort::Recent => query.order_by_desc(ratings::Column::CreatedAt),
            RatingSort::Helpful => query
                .order_by_desc(ratings::Column::Helpful)
                .order_by_desc(ratings::Column::CreatedAt),
        };

        let models = query
            .order_by_desc(ratings::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list ratings")?;

        self.hydrate(models).await
    }

    pub async fn get(&self, id: i32) -> Result<Option<Rating>> {
        let Some(model) = Ratings::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        Ok(self.hydrate(vec![model]).await?.pop())
    }

    pub async fn find_by_user(&self, module_id: ModuleId, user_id: UserId) -> Result<Option<i32>> {
        let model = Ratings::find()
            .filter(ratings::Column::ModuleId.eq(module_id.value()))
            .filter(ratings::Column::UserId.eq(user_id.value()))
            .one(&self.conn)
            .await?;

        Ok(model.map(|r| r.id))
    }

    pub async fn create(
        &self,
        module_id: ModuleId,
        user_id: UserId,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Option<Rating>> {
        let now = chrono::Utc::now().to_rfc3339();
        let active = ratings::ActiveModel {
            module_id: Set(module_id.value()),
            user_id: Set(user_id.value()),
            rating: Set(rating),
            comment: Set(comment),
            helpful: Set(0),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = match active.insert(&self.conn).await {
            Ok(model) => model,
            // One rating per user and module, enforced by idx_ratings_module_user.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Ok(None);
            }
            Err(e) => return Err(e).context("Failed to insert rating"),
        };

        let rating = self
            .hydrate(vec![model])
            .await?
            .pop()
            .context("Inserted rating vanished")?;
        Ok(Some(rating))
    }

    pub async fn update(
        &self,
        id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Option<Rating>> {
        let Some(model) = Ratings::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: ratings::ActiveModel = model.into();
        active.rating = Set(rating);
        active.comment = Set(comment);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update rating")?;

        Ok(self.hydrate(vec![model]).await?.pop())
    }

    /// Deletes a rating and its replies.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        Replies::delete_many()
            .filter(replies::Column::RatingId.eq(id))
            .exec(&txn)
            .await?;

        let result = Ratings::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn increment_helpful(&self, id: i32) -> Result<()> {
        Ratings::update_many()
            .col_expr(
                ratings::Column::Helpful,
                Expr::col(ratings::Column::Helpful).add(1),
            )
            .filter(ratings::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to increment helpful counter")?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(Ratings::find().count(&self.conn).await?)
    }

    pub async fn create_reply(
        &self,
        rating_id: i32,
        user_id: UserId,
        comment: &str,
    ) -> Result<Reply> {
        let active = replies::ActiveModel {
            rating_id: Set(rating_id),
            user_id: Set(user_id.value()),
            comment: Set(comment.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert reply")?;

        let names = self.usernames(vec![model.user_id]).await?;
        Ok(Self::map_reply(model, &names))
    }

    pub async fn get_reply(&self, id: i32) -> Result<Option<Reply>> {
        let Some(model) = Replies::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let names = self.usernames(vec![model.user_id]).await?;
        Ok(Some(Self::map_reply(model, &names)))
    }

    pub async fn delete_reply(&self, id: i32) -> Result<bool> {
        let result = Replies::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
