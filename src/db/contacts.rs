use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{ContactFilter, ContactStore, DbPool, StoreError, StoreResult, Window};
use crate::model::contact::{Contact, ContactPatch, ContactRow, NewContact};

const CONTACT_COLUMNS: &str = "id, name, email, project_type, message, status, priority, \
                               deleted_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgContactStore {
    pool: DbPool,
}

impl PgContactStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ContactFilter) {
    builder.push(" WHERE deleted_at IS NULL");
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(search) = &filter.search {
        // strpos keeps the match literal; LIKE would treat % and _ as wildcards.
        // Both sides go through Postgres lower() so they fold the same way.
        builder
            .push(" AND (strpos(lower(name), lower(")
            .push_bind(search.clone())
            .push(")) > 0 OR strpos(lower(email), lower(")
            .push_bind(search.clone())
            .push(")) > 0 OR strpos(lower(message), lower(")
            .push_bind(search.clone())
            .push(")) > 0)");
    }
}

fn into_contact(row: ContactRow) -> StoreResult<Contact> {
    Contact::try_from(row).map_err(StoreError::Corrupt)
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn find_non_deleted(
        &self,
        filter: &ContactFilter,
        window: Option<Window>,
    ) -> StoreResult<Vec<Contact>> {
        let mut builder = QueryBuilder::new(format!("SELECT {CONTACT_COLUMNS} FROM contacts"));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, id DESC");
        if let Some(window) = window {
            builder
                .push(" LIMIT ")
                .push_bind(window.limit)
                .push(" OFFSET ")
                .push_bind(window.skip);
        }

        let rows: Vec<ContactRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(into_contact).collect()
    }

    async fn find_one_non_deleted(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_contact).transpose()
    }

    async fn count_non_deleted(&self, filter: &ContactFilter) -> StoreResult<i64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM contacts");
        push_filter(&mut builder, filter);

        let (total,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn insert(&self, contact: NewContact) -> StoreResult<Contact> {
        let row: ContactRow = sqlx::query_as(&format!(
            "INSERT INTO contacts (id, name, email, project_type, message) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.project_type)
        .bind(&contact.message)
        .fetch_one(&self.pool)
        .await?;

        into_contact(row)
    }

    async fn update(&self, id: Uuid, patch: ContactPatch) -> StoreResult<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "UPDATE contacts SET status = COALESCE($2, status), \
             priority = COALESCE($3, priority), updated_at = $4 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.status.map(|status| status.as_str()))
        .bind(patch.priority.map(|priority| priority.as_str()))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_contact).transpose()
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "UPDATE contacts SET deleted_at = $2, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_contact).transpose()
    }
}
