use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{strips_last_admin, DbPool, StoreError, StoreResult, UserFilter, UserStore, UserWrite};
use crate::model::user::{NewUser, User, UserPatch, UserRow};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, deleted_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Appends `WHERE deleted_at IS NULL` plus one clause per set filter field.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE deleted_at IS NULL");
    if let Some(id) = filter.id {
        builder.push(" AND id = ").push_bind(id);
    }
    if let Some(email) = &filter.email {
        builder.push(" AND email = ").push_bind(email.clone());
    }
    if let Some(username) = &filter.username {
        builder.push(" AND username = ").push_bind(username.clone());
    }
    if let Some(role) = filter.role {
        builder.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(active) = filter.is_active {
        builder.push(" AND is_active = ").push_bind(active);
    }
}

fn into_user(row: UserRow) -> StoreResult<User> {
    User::try_from(row).map_err(StoreError::Corrupt)
}

/// Row-locks every active admin, then the target. Concurrent admin changes
/// queue on the first lock, and a waiter re-reads the admin set once the
/// holder commits. Returns the target with the active admin count.
async fn lock_admin_change(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<(User, i64)>> {
    let admins: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM users WHERE role = 'admin' AND is_active AND deleted_at IS NULL \
         ORDER BY id FOR UPDATE",
    )
    .fetch_all(&mut *conn)
    .await?;

    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some((into_user(row)?, admins.len() as i64))),
        None => Ok(None),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_non_deleted(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let mut builder = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<UserRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(into_user).collect()
    }

    async fn find_one_non_deleted(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let mut builder = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filter(&mut builder, filter);
        builder.push(" LIMIT 1");

        let row: Option<UserRow> = builder.build_query_as().fetch_optional(&self.pool).await?;
        row.map(into_user).transpose()
    }

    async fn count_non_deleted(&self, filter: &UserFilter) -> StoreResult<i64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_filter(&mut builder, filter);

        let (total,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        into_user(row)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<UserWrite> {
        let mut tx = self.pool.begin().await?;
        let Some((current, active_admins)) = lock_admin_change(&mut tx, id).await? else {
            return Ok(UserWrite::Missing);
        };
        if strips_last_admin(&current, patch.keeps_active_admin(&current), active_admins) {
            return Ok(UserWrite::LastAdmin);
        }

        let row: UserRow = sqlx::query_as(&format!(
            "UPDATE users SET role = COALESCE($2, role), is_active = COALESCE($3, is_active), \
             updated_at = $4 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.role.map(|role| role.as_str()))
        .bind(patch.is_active)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(UserWrite::Applied(into_user(row)?))
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<UserWrite> {
        let mut tx = self.pool.begin().await?;
        let Some((current, active_admins)) = lock_admin_change(&mut tx, id).await? else {
            return Ok(UserWrite::Missing);
        };
        if strips_last_admin(&current, false, active_admins) {
            return Ok(UserWrite::LastAdmin);
        }

        let row: UserRow = sqlx::query_as(&format!(
            "UPDATE users SET deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(UserWrite::Applied(into_user(row)?))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
