use thiserror::Error;
use tracing::info;

use crate::{
    auth::{password::HashError, PasswordHasher},
    config::SeedAdmin,
    db::{StoreError, UserFilter, UserStore},
    model::user::{normalize_email, NewUser, Role, User},
};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Creates the bootstrap admin unless a live user already owns its email.
/// Returns the new account, or `None` when nothing had to be done.
pub async fn ensure_admin(
    users: &dyn UserStore,
    passwords: &PasswordHasher,
    seed: &SeedAdmin,
) -> Result<Option<User>, SeedError> {
    let email = normalize_email(&seed.email);
    if let Some(existing) = users
        .find_one_non_deleted(&UserFilter::email(email.clone()))
        .await?
    {
        info!(email = %existing.email, "admin user already exists");
        return Ok(None);
    }

    let password_hash = passwords.hash(seed.password.clone()).await?;
    let admin = users
        .insert(NewUser {
            username: seed.username.trim().to_string(),
            email,
            password_hash,
            role: Role::Admin,
        })
        .await?;
    info!(email = %admin.email, username = %admin.username, "default admin user created");

    Ok(Some(admin))
}
