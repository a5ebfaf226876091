//! `SeaORM` implementation of the `ApiKeyService` trait.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{RwLock, broadcast};
use tokio::task;
use tracing::{debug, info};

use crate::config::Config;
use crate::constants::api_keys::{KEY_RANDOM_BYTES, LOOKUP_PREFIX_LEN};
use crate::db::repositories::user::{hash_password, verify_hash};
use crate::db::{RevokeOutcome, Store};
use crate::domain::events::NotificationEvent;
use crate::domain::{Actor, ApiScope};
use crate::models::api_key::ApiKeyInfo;
use crate::services::api_key_service::{
    ApiKeyError, ApiKeyService, CreatedKey, VerifiedKey, format_key, lookup_prefix,
};

const MAX_PREFIX_ATTEMPTS: usize = 5;

fn generate_key() -> String {
    let bytes: [u8; KEY_RANDOM_BYTES] = rand::rng().random();
    format_key(&bytes)
}

pub struct SeaOrmApiKeyService {
    store: Store,
    config: Arc<RwLock<Config>>,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl SeaOrmApiKeyService {
    #[must_use]
    pub const fn new(
        store: Store,
        config: Arc<RwLock<Config>>,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            store,
            config,
            event_bus,
        }
    }

    /// Draws keys until the lookup prefix is unused.
    async fn unique_key(&self) -> Result<String, ApiKeyError> {
        let repo = self.store.api_key_repo();
        for _ in 0..MAX_PREFIX_ATTEMPTS {
            let key = generate_key();
            if !repo.prefix_exists(&key[..LOOKUP_PREFIX_LEN]).await? {
                return Ok(key);
            }
        }
        Err(ApiKeyError::Internal(
            "Could not generate a unique key prefix".to_string(),
        ))
    }
}

#[async_trait]
impl ApiKeyService for SeaOrmApiKeyService {
    async fn create(
        &self,
        actor: &Actor,
        name: &str,
        scopes: &[ApiScope],
        expires_in_days: Option<u32>,
    ) -> Result<CreatedKey, ApiKeyError> {
        if scopes.contains(&ApiScope::Admin) && !actor.is_admin() {
            return Err(ApiKeyError::AdminScopeForbidden);
        }

        let security = self.config.read().await.security.clone();
        let repo = self.store.api_key_repo();

        if repo.count_active_for_user(actor.id).await? >= security.max_api_keys_per_user {
            return Err(ApiKeyError::LimitReached(security.max_api_keys_per_user));
        }

        let days = expires_in_days.unwrap_or(security.default_api_key_expiry_days);
        let expires_at = (days > 0).then(|| {
            (chrono::Utc::now() + chrono::Duration::days(i64::from(days))).to_rfc3339()
        });

        let key = self.unique_key().await?;
        let prefix = key[..LOOKUP_PREFIX_LEN].to_string();

        let secret = key.clone();
        let key_hash = task::spawn_blocking(move || hash_password(&secret, Some(&security)))
            .await
            .context("Key hashing task panicked")??;

        let mut unique_scopes: Vec<ApiScope> = Vec::with_capacity(scopes.len());
        for scope in scopes {
            if !unique_scopes.contains(scope) {
                unique_scopes.push(*scope);
            }
        }
        let info = repo
            .create(actor.id, name.trim(), &prefix, &key_hash, &unique_scopes, expires_at)
            .await?;

        info!(user = %actor.username, prefix = %info.prefix, "API key created");
        let _ = self.event_bus.send(NotificationEvent::ApiKeyCreated {
            username: actor.username.clone(),
            prefix: info.prefix.clone(),
        });

        Ok(CreatedKey { key, info })
    }

    async fn list_for_user(&self, actor: &Actor) -> Result<Vec<ApiKeyInfo>, ApiKeyError> {
        Ok(self.store.api_key_repo().list_for_user(actor.id).await?)
    }

    async fn list_all(&self) -> Result<Vec<ApiKeyInfo>, ApiKeyError> {
        Ok(self.store.api_key_repo().list_all().await?)
    }

    async fn revoke(&self, actor: &Actor, id: i32) -> Result<ApiKeyInfo, ApiKeyError> {
        let repo = self.store.api_key_repo();
        let key = repo
            .get(id)
            .await?
            .filter(|k| actor.can_manage(Some(k.user_id)))
            .ok_or(ApiKeyError::NotFound)?;

        match repo.revoke(id).await? {
            RevokeOutcome::Revoked => {}
            RevokeOutcome::AlreadyRevoked => return Err(ApiKeyError::AlreadyRevoked),
            RevokeOutcome::NotFound => return Err(ApiKeyError::NotFound),
        }

        info!(key_id = id, prefix = %key.prefix, actor = %actor.username, "API key revoked");
        let _ = self.event_bus.send(NotificationEvent::ApiKeyRevoked {
            key_id: id,
            prefix: key.prefix.clone(),
            revoked_by: actor.username.clone(),
        });

        repo.get(id).await?.ok_or(ApiKeyError::NotFound)
    }

    async fn verify(&self, key: &str) -> Result<Option<VerifiedKey>, ApiKeyError> {
        let Some(prefix) = lookup_prefix(key) else {
            return Ok(None);
        };

        let repo = self.store.api_key_repo();
        let Some((info, key_hash)) = repo.find_by_prefix(prefix).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();
        if info.is_revoked() || info.is_expired(&now) {
            debug!(prefix, "Rejected revoked or expired API key");
            return Ok(None);
        }

        let secret = key.to_string();
        let valid = task::spawn_blocking(move || verify_hash(&key_hash, &secret))
            .await
            .context("Key verification task panicked")??;
        if !valid {
            return Ok(None);
        }

        repo.touch_last_used(info.id).await?;

        let Some(user) = self.store.user_repo().get_by_id(info.user_id).await? else {
            return Ok(None);
        };

        Ok(Some(VerifiedKey { user, key: info }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::domain::UserRole;

    async fn setup() -> (SeaOrmApiKeyService, Actor, Actor) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let user = store
            .user_repo()
            .create("dev", None, "password123", UserRole::User, &SecurityConfig::default())
            .await
            .unwrap();
        let admin = store.user_repo().get_by_username("admin").await.unwrap().unwrap();

        let mut config = Config::default();
        config.security.max_api_keys_per_user = 2;
        let (tx, _rx) = broadcast::channel(16);
        let service = SeaOrmApiKeyService::new(store, Arc::new(RwLock::new(config)), tx);

        let user = Actor {
            id: user.id,
            username: user.username,
            role: UserRole::User,
        };
        let admin = Actor {
            id: admin.id,
            username: admin.username,
            role: UserRole::Admin,
        };
        (service, user, admin)
    }

    #[tokio::test]
    async fn test_created_key_verifies_until_revoked() {
        let (service, user, _) = setup().await;
        let created = service
            .create(&user, "ci", &[ApiScope::Read, ApiScope::Write], Some(30))
            .await
            .unwrap();

        assert!(created.key.starts_with("rmk_"));
        assert_eq!(created.key.len(), 44);
        assert_eq!(created.info.prefix, &created.key[..12]);
        assert!(created.info.expires_at.is_some());

        let verified = service.verify(&created.key).await.unwrap().unwrap();
        assert_eq!(verified.user.id, user.id);
        assert!(verified.key.has_scope(ApiScope::Write));

        let revoked = service.revoke(&user, created.info.id).await.unwrap();
        let revoked_at = revoked.revoked_at.clone().unwrap();

        assert!(service.verify(&created.key).await.unwrap().is_none());
        assert!(matches!(
            service.revoke(&user, created.info.id).await,
            Err(ApiKeyError::AlreadyRevoked)
        ));

        let after = service.store.api_key_repo().get(created.info.id).await.unwrap().unwrap();
        assert_eq!(after.revoked_at, Some(revoked_at));
    }

    #[tokio::test]
    async fn test_admin_scope_requires_admin() {
        let (service, user, admin) = setup().await;
        assert!(matches!(
            service.create(&user, "root", &[ApiScope::Admin], None).await,
            Err(ApiKeyError::AdminScopeForbidden)
        ));
        assert!(service.create(&admin, "root", &[ApiScope::Admin], None).await.is_ok());
    }

    #[tokio::test]
    async fn test_limit_and_foreign_revoke() {
        let (service, user, admin) = setup().await;
        let first = service.create(&user, "a", &[ApiScope::Read], Some(1)).await.unwrap();
        service.create(&user, "b", &[ApiScope::Read], Some(1)).await.unwrap();
        assert!(matches!(
            service.create(&user, "c", &[ApiScope::Read], Some(1)).await,
            Err(ApiKeyError::LimitReached(2))
        ));

        let admin_key = service.create(&admin, "own", &[ApiScope::Read], None).await.unwrap();
        assert!(matches!(
            service.revoke(&user, admin_key.info.id).await,
            Err(ApiKeyError::NotFound)
        ));

        service.revoke(&admin, first.info.id).await.unwrap();
        assert!(service.create(&user, "c", &[ApiScope::Read], Some(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_keys_do_not_verify() {
        let (service, _, _) = setup().await;
        assert!(service.verify("not-a-key").await.unwrap().is_none());
        let unknown = format_key(&[7; KEY_RANDOM_BYTES]);
        assert!(service.verify(&unknown).await.unwrap().is_none());
    }
}
