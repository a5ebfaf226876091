//! `SeaORM` implementation of the `RatingService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::Store;
use crate::domain::{Actor, ModuleId};
use crate::models::rating::{Rating, RatingSort, Reply};
use crate::services::rating_service::{RatingError, RatingService};

pub struct SeaOrmRatingService {
    store: Store,
}

impl SeaOrmRatingService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn published_module(&self, slug: &str) -> Result<ModuleId, RatingError> {
        let module = self
            .store
            .module_repo()
            .get_by_slug(slug)
            .await?
            .ok_or(RatingError::ModuleNotFound)?;

        if module.is_public() {
            Ok(module.id)
        } else {
            Err(RatingError::NotPublished)
        }
    }

    async fn rating(&self, id: i32) -> Result<Rating, RatingError> {
        self.store
            .rating_repo()
            .get(id)
            .await?
            .ok_or(RatingError::NotFound)
    }
}

#[async_trait]
impl RatingService for SeaOrmRatingService {
    async fn list(&self, slug: &str, sort: RatingSort) -> Result<Vec<Rating>, RatingError> {
        let module_id = self
            .published_module(slug)
            .await
            .map_err(|e| match e {
                RatingError::NotPublished => RatingError::ModuleNotFound,
                other => other,
            })?;

        Ok(self.store.rating_repo().list_for_module(module_id, sort).await?)
    }

    async fn create(
        &self,
        actor: &Actor,
        slug: &str,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Rating, RatingError> {
        let module_id = self.published_module(slug).await?;

        let ratings = self.store.rating_repo();
        if ratings.find_by_user(module_id, actor.id).await?.is_some() {
            return Err(RatingError::AlreadyRated);
        }

        let created = ratings
            .create(module_id, actor.id, rating, comment)
            .await?
            .ok_or(RatingError::AlreadyRated)?;
        info!(module_id = %module_id, user = %actor.username, rating, "Rating added");

        Ok(created)
    }

    async fn update(
        &self,
        actor: &Actor,
        id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Rating, RatingError> {
        let existing = self.rating(id).await?;
        if existing.user_id != actor.id {
            return Err(RatingError::Forbidden(
                "You can only edit your own rating".to_string(),
            ));
        }

        self.store
            .rating_repo()
            .update(id, rating, comment)
            .await?
            .ok_or(RatingError::NotFound)
    }

    async fn delete(&self, actor: &Actor, id: i32) -> Result<(), RatingError> {
        let existing = self.rating(id).await?;
        if !actor.can_manage(Some(existing.user_id)) {
            return Err(RatingError::Forbidden(
                "You can only delete your own rating".to_string(),
            ));
        }

        if !self.store.rating_repo().delete(id).await? {
            return Err(RatingError::NotFound);
        }
        info!(rating_id = id, actor = %actor.username, "Rating deleted");
        Ok(())
    }

    async fn mark_helpful(&self, actor: &Actor, id: i32) -> Result<Rating, RatingError> {
        let existing = self.rating(id).await?;
        if existing.user_id == actor.id {
            return Err(RatingError::Forbidden(
                "You cannot vote on your own rating".to_string(),
            ));
        }

        self.store.rating_repo().increment_helpful(id).await?;
        self.rating(id).await
    }

    async fn reply(
        &self,
        actor: &Actor,
        rating_id: i32,
        comment: &str,
    ) -> Result<Reply, RatingError> {
        self.rating(rating_id).await?;
        Ok(self
            .store
            .rating_repo()
            .create_reply(rating_id, actor.id, comment.trim())
            .await?)
    }

    async fn delete_reply(&self, actor: &Actor, id: i32) -> Result<(), RatingError> {
        let reply = self
            .store
            .rating_repo()
            .get_reply(id)
            .await?
            .ok_or(RatingError::ReplyNotFound)?;

        if !actor.can_manage(Some(reply.user_id)) {
            return Err(RatingError::Forbidden(
                "You can only delete your own reply".to_string(),
            ));
        }

        self.store.rating_repo().delete_reply(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::domain::{ModuleStatus, UserRole};
    use crate::models::module::ModuleDraft;

    fn draft() -> ModuleDraft {
        ModuleDraft {
            name: "Zygisk Next".to_string(),
            short_description: "Standalone Zygisk implementation".to_string(),
            description: "Provides Zygisk API support for KernelSU and APatch".to_string(),
            author: "Dr-TSNG".to_string(),
            category: "System".to_string(),
            license: "GPL-3.0".to_string(),
            android_versions: vec!["14".to_string()],
            root_methods: vec!["KernelSU".to_string()],
            features: vec![],
            source_url: "https://github.com/Dr-TSNG/ZygiskNext".to_string(),
            icon_url: None,
            is_open_source: true,
        }
    }

    async fn actor(store: &Store, name: &str) -> Actor {
        let user = store
            .user_repo()
            .create(name, None, "password123", UserRole::User, &SecurityConfig::default())
            .await
            .unwrap();
        Actor {
            id: user.id,
            username: user.username,
            role: UserRole::User,
        }
    }

    async fn setup(published: bool) -> (SeaOrmRatingService, Actor, Actor, String) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let owner = actor(&store, "owner").await;
        let reader = actor(&store, "reader").await;
        let module = store
            .module_repo()
            .insert_submission(&draft(), owner.id, &[])
            .await
            .unwrap();
        if published {
            store
                .module_repo()
                .set_review(module.id, ModuleStatus::Approved, true, owner.id, None)
                .await
                .unwrap();
        }
        (SeaOrmRatingService::new(store), owner, reader, module.slug)
    }

    #[tokio::test]
    async fn test_one_rating_per_user() {
        let (service, _, reader, slug) = setup(true).await;
        service.create(&reader, &slug, 5, None).await.unwrap();
        assert!(matches!(
            service.create(&reader, &slug, 4, Some("again".to_string())).await,
            Err(RatingError::AlreadyRated)
        ));
    }

    #[tokio::test]
    async fn test_unpublished_module_cannot_be_rated() {
        let (service, _, reader, slug) = setup(false).await;
        assert!(matches!(
            service.create(&reader, &slug, 5, None).await,
            Err(RatingError::NotPublished)
        ));
        assert!(matches!(
            service.list(&slug, RatingSort::Recent).await,
            Err(RatingError::ModuleNotFound)
        ));
    }

    #[tokio::test]
    async fn test_ownership_rules() {
        let (service, owner, reader, slug) = setup(true).await;
        let rating = service
            .create(&reader, &slug, 4, Some("Works on my Pixel".to_string()))
            .await
            .unwrap();

        assert!(matches!(
            service.update(&owner, rating.id, 1, None).await,
            Err(RatingError::Forbidden(_))
        ));
        assert!(matches!(
            service.mark_helpful(&reader, rating.id).await,
            Err(RatingError::Forbidden(_))
        ));

        let voted = service.mark_helpful(&owner, rating.id).await.unwrap();
        assert_eq!(voted.helpful, 1);

        let reply = service.reply(&owner, rating.id, "  Thanks!  ").await.unwrap();
        assert_eq!(reply.comment, "Thanks!");
        assert!(matches!(
            service.delete_reply(&reader, reply.id).await,
            Err(RatingError::Forbidden(_))
        ));

        let updated = service.update(&reader, rating.id, 5, None).await.unwrap();
        assert_eq!(updated.rating, 5);
        assert_eq!(updated.replies.len(), 1);

        let ratings = service.list(&slug, RatingSort::Helpful).await.unwrap();
        assert_eq!(ratings.len(), 1);

        service.delete(&reader, rating.id).await.unwrap();
        assert!(service.list(&slug, RatingSort::Recent).await.unwrap().is_empty());
    }
}
