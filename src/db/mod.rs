//! Persistence layer.
//!
//! Both collections are reached only through [`UserStore`] and
//! [`ContactStore`]. Every read these traits expose already excludes
//! soft-deleted rows, so business code has no way to query the raw tables.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    contact::{Contact, ContactPatch, ContactStatus, NewContact, Priority},
    user::{NewUser, Role, User, UserPatch},
};

pub mod contacts;
#[cfg(test)]
pub mod memory;
pub mod users;

pub use contacts::PgContactStore;
pub use users::PgUserStore;

pub type DbPool = PgPool;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn migrate(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint `{constraint}` violated")]
    Conflict { constraint: String },

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Equality filter over non-deleted users. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub id: Option<Uuid>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserFilter {
    pub fn id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn active_admins() -> Self {
        Self {
            role: Some(Role::Admin),
            is_active: Some(true),
            ..Self::default()
        }
    }
}

/// Filter over non-deleted contacts. `search` is a case-insensitive substring
/// match against name, email and message.
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub status: Option<ContactStatus>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
}

impl ContactFilter {
    pub fn status(status: ContactStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Outcome of a user write that must leave at least one active admin.
#[derive(Debug)]
pub enum UserWrite {
    Applied(User),
    /// No non-deleted user has that id.
    Missing,
    /// The write would remove the last active admin; nothing changed.
    LastAdmin,
}

/// True when `user` is the only active admin and the write takes that away.
pub(crate) fn strips_last_admin(user: &User, keeps_admin: bool, active_admins: i64) -> bool {
    user.is_active_admin() && !keeps_admin && active_admins <= 1
}

/// Offset window for listings: `skip` rows are dropped, at most `limit` kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: i64,
    pub limit: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Non-deleted users matching `filter`, newest first.
    async fn find_non_deleted(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn find_one_non_deleted(&self, filter: &UserFilter) -> StoreResult<Option<User>>;

    async fn count_non_deleted(&self, filter: &UserFilter) -> StoreResult<i64>;

    async fn insert(&self, user: NewUser) -> StoreResult<User>;

    /// Applies `patch` to a non-deleted user. The last-admin check and the
    /// write are one atomic step.
    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<UserWrite>;

    /// Stamps `deleted_at` on a non-deleted user, atomically refusing to
    /// delete the last active admin.
    async fn soft_delete(&self, id: Uuid) -> StoreResult<UserWrite>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Non-deleted contacts matching `filter`, newest first, optionally
    /// restricted to an offset window.
    async fn find_non_deleted(
        &self,
        filter: &ContactFilter,
        window: Option<Window>,
    ) -> StoreResult<Vec<Contact>>;

    async fn find_one_non_deleted(&self, id: Uuid) -> StoreResult<Option<Contact>>;

    async fn count_non_deleted(&self, filter: &ContactFilter) -> StoreResult<i64>;

    async fn insert(&self, contact: NewContact) -> StoreResult<Contact>;

    /// Applies `patch` to a non-deleted contact; `None` if no such contact.
    async fn update(&self, id: Uuid, patch: ContactPatch) -> StoreResult<Option<Contact>>;

    /// Stamps `deleted_at`; `None` if the contact is absent or already deleted.
    async fn soft_delete(&self, id: Uuid) -> StoreResult<Option<Contact>>;
}
