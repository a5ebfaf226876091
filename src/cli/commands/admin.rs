//! Create-admin command handler

use crate::api::validation::{Validator, validate_registration};
use crate::config::Config;
use crate::db::Store;
use crate::domain::UserRole;

pub async fn cmd_create_admin(
    config: &Config,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> anyhow::Result<()> {
    let username = username.trim();
    let email = email.map(str::trim).filter(|e| !e.is_empty());

    let mut v = Validator::new();
    validate_registration(&mut v, username, email, password);
    if !v.is_valid() {
        for err in v.errors() {
            println!("  {}: {}", err.field, err.message);
        }
        anyhow::bail!("Invalid admin account details");
    }

    let store = Store::new(&config.general.database_path).await?;
    let users = store.user_repo();

    if users.username_taken(username).await? {
        println!("User '{username}' already exists.");
        return Ok(());
    }
    if let Some(email) = email
        && users.email_taken(email).await?
    {
        println!("Email '{email}' is already in use.");
        return Ok(());
    }

    let user = users
        .create(username, email, password, UserRole::Admin, &config.security)
        .await?;

    println!("Created admin '{}' (ID: {})", user.username, user.id);
    Ok(())
}
