use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::{
    extract::{parse_id, ValidJson},
    users::users_router,
    AppState,
};
use crate::{
    auth::AdminUser,
    db::{ContactFilter, UserFilter, Window},
    error::{ApiError, ApiResult},
    model::{
        contact::{
            Contact, ContactListResponse, ContactPatch, ContactQuery, ContactStatus,
            DashboardSummary, Priority, UpdatePriorityRequest, UpdateStatusRequest,
        },
        user::Role,
    },
};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

// Admin back-office, mounted at /api/admin. Every handler takes `AdminUser`.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/contacts", get(list_contacts))
        .route("/contacts/:id", get(get_contact).delete(delete_contact))
        .route("/contacts/:id/status", put(update_status))
        .route("/contacts/:id/priority", put(update_priority))
        .merge(users_router())
}

pub async fn dashboard(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<DashboardSummary>> {
    let contacts = &state.contacts;
    let all = ContactFilter::default();
    let new = ContactFilter::status(ContactStatus::New);
    let in_progress = ContactFilter::status(ContactStatus::InProgress);
    let resolved = ContactFilter::status(ContactStatus::Resolved);
    let admins = UserFilter::role(Role::Admin);

    let (total_contacts, new_contacts, in_progress_contacts, resolved_contacts, total_admins) =
        tokio::try_join!(
            contacts.count_non_deleted(&all),
            contacts.count_non_deleted(&new),
            contacts.count_non_deleted(&in_progress),
            contacts.count_non_deleted(&resolved),
            state.users.count_non_deleted(&admins),
        )?;

    Ok(Json(DashboardSummary {
        total_contacts,
        new_contacts,
        in_progress_contacts,
        resolved_contacts,
        total_admins,
    }))
}

/// Lenient integer parse: anything unparsable falls back to `default`.
fn number_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Turns the raw query string into a typed filter plus page and limit.
fn contact_filter(query: ContactQuery) -> ApiResult<(ContactFilter, i64, i64)> {
    let page = number_or(query.page.as_deref(), 1).max(1);
    let limit = number_or(query.limit.as_deref(), DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let status = non_empty(query.status)
        .map(|s| s.parse::<ContactStatus>())
        .transpose()
        .map_err(|_| ApiError::invalid("status", "Invalid status value"))?;
    let priority = non_empty(query.priority)
        .map(|p| p.parse::<Priority>())
        .transpose()
        .map_err(|_| ApiError::invalid("priority", "Invalid priority value"))?;

    let filter = ContactFilter {
        status,
        priority,
        search: non_empty(query.search),
    };
    Ok((filter, page, limit))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ContactQuery>,
) -> ApiResult<Json<ContactListResponse>> {
    let (filter, page, limit) = contact_filter(query)?;

    let total = state.contacts.count_non_deleted(&filter).await?;
    let window = Window {
        skip: (page - 1).saturating_mul(limit),
        limit,
    };
    let contacts = state.contacts.find_non_deleted(&filter, Some(window)).await?;

    Ok(Json(ContactListResponse {
        contacts,
        total_pages: (total + limit - 1) / limit,
        current_page: page,
        total,
    }))
}

pub async fn get_contact(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Contact>> {
    let id = parse_id(&id, "Contact")?;
    let contact = state
        .contacts
        .find_one_non_deleted(id)
        .await?
        .ok_or(ApiError::NotFound("Contact"))?;
    Ok(Json(contact))
}

async fn apply_patch(state: &AppState, raw_id: &str, patch: ContactPatch) -> ApiResult<Contact> {
    let id = parse_id(raw_id, "Contact")?;
    state
        .contacts
        .update(id, patch)
        .await?
        .ok_or(ApiError::NotFound("Contact"))
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateStatusRequest>,
) -> ApiResult<Json<Contact>> {
    let patch = ContactPatch {
        status: Some(payload.status),
        ..ContactPatch::default()
    };
    let contact = apply_patch(&state, &id, patch).await?;
    info!(contact_id = %contact.id, status = %contact.status, by = %admin.id, "contact status updated");
    Ok(Json(contact))
}

pub async fn update_priority(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdatePriorityRequest>,
) -> ApiResult<Json<Contact>> {
    let patch = ContactPatch {
        priority: Some(payload.priority),
        ..ContactPatch::default()
    };
    let contact = apply_patch(&state, &id, patch).await?;
    info!(contact_id = %contact.id, priority = %contact.priority, by = %admin.id, "contact priority updated");
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "Contact")?;
    state
        .contacts
        .soft_delete(id)
        .await?
        .ok_or(ApiError::NotFound("Contact"))?;
    info!(contact_id = %id, by = %admin.id, "contact soft-deleted");
    Ok(Json(json!({ "msg": "Contact removed" })))
}
