//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::info;

use crate::config::Config;
use crate::db::{Store, User};
use crate::domain::events::NotificationEvent;
use crate::domain::{Actor, UserId, UserRole};
use crate::services::auth_service::{AuthError, AuthService, Registration};

pub struct SeaOrmAuthService {
    store: Store,
    config: Arc<RwLock<Config>>,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl SeaOrmAuthService {
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
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        self.store
            .user_repo()
            .verify_password(username.trim(), password)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let (enabled, security) = {
            let config = self.config.read().await;
            (config.server.registration_enabled, config.security.clone())
        };
        if !enabled {
            return Err(AuthError::RegistrationDisabled);
        }

        let users = self.store.user_repo();
        let username = registration.username.trim();
        if users.username_taken(username).await? {
            return Err(AuthError::Conflict("Username is already taken".to_string()));
        }

        let email = registration
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        if let Some(email) = email
            && users.email_taken(email).await?
        {
            return Err(AuthError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let user = users
            .create(
                username,
                email,
                &registration.password,
                UserRole::User,
                &security,
            )
            .await?;

        info!(user_id = %user.id, username = %user.username, "Registered new user");
        let _ = self.event_bus.send(NotificationEvent::UserRegistered {
            username: user.username.clone(),
        });

        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.store
            .user_repo()
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn change_password(
        &self,
        id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let user = self.get_user(id).await?;
        let verified = self
            .store
            .user_repo()
            .verify_password(&user.username, current_password)
            .await?;
        if verified.is_none() {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let security = self.config.read().await.security.clone();
        self.store
            .user_repo()
            .update_password(id, new_password, &security)
            .await?;

        info!(user_id = %id, "Password changed");
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.user_repo().list().await?)
    }

    async fn set_role(&self, actor: &Actor, id: UserId, role: UserRole) -> Result<User, AuthError> {
        let users = self.store.user_repo();
        let target = users.get_by_id(id).await?.ok_or(AuthError::UserNotFound)?;

        if target.role == role {
            return Ok(target);
        }

        if target.is_admin() && role != UserRole::Admin && users.count_admins().await? <= 1 {
            return Err(AuthError::Conflict(
                "Cannot demote the last admin".to_string(),
            ));
        }

        let updated = users.set_role(id, role).await?.ok_or(AuthError::UserNotFound)?;

        info!(
            actor = %actor.username,
            user = %updated.username,
            role = %role,
            "Changed user role"
        );
        let _ = self.event_bus.send(NotificationEvent::UserRoleChanged {
            username: updated.username.clone(),
            role: role.to_string(),
        });

        Ok(updated)
    }
}
