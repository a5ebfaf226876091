//! Domain service for accounts.
//!
//! Handles login, registration, password changes and role management.
//! API keys live in [`crate::services::api_key_service`].

use thiserror::Error;

use crate::db::User;
use crate::domain::{Actor, UserId, UserRole};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Registration is disabled")]
    RegistrationDisabled,

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Account fields for a new registration. Already validated by the caller.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

/// Domain service trait for accounts.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Creates a `user`-role account with the `credentials` provider.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when the username or email is taken.
    async fn register(&self, registration: Registration) -> Result<User, AuthError>;

    async fn get_user(&self, id: UserId) -> Result<User, AuthError>;

    /// Changes a user's password and clears `must_change_password`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the current password is wrong or the new one is unchanged.
    async fn change_password(
        &self,
        id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    async fn list_users(&self) -> Result<Vec<User>, AuthError>;

    /// Changes a user's role. The last admin cannot be demoted.
    async fn set_role(&self, actor: &Actor, id: UserId, role: UserRole) -> Result<User, AuthError>;
}
