use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::{
    extract::{parse_id, Checks, ValidJson},
    AppState,
};
use crate::{
    auth::AdminUser,
    db::{UserFilter, UserWrite},
    error::{ApiError, ApiResult},
    model::user::{CreateUserRequest, NewUser, PublicUser, UpdateUserRequest, User, UserPatch},
};

const MIN_PASSWORD_LEN: usize = 6;

// Admin user management, merged into the /api/admin router
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = state.users.find_non_deleted(&UserFilter::default()).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    let mut checks = Checks::default();
    let username = checks.required("username", payload.username, "Username is required");
    let email = checks.email("email", payload.email);
    let password = checks.min_len(
        "password",
        payload.password,
        MIN_PASSWORD_LEN,
        "Password must be at least 6 characters",
    );
    checks.finish()?;

    if state
        .users
        .find_one_non_deleted(&UserFilter::email(email.clone()))
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateEmail);
    }
    if state
        .users
        .find_one_non_deleted(&UserFilter::username(username.clone()))
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateUsername);
    }

    let password_hash = state.passwords.hash(password).await?;
    let user = state
        .users
        .insert(NewUser {
            username,
            email,
            password_hash,
            role: payload.role.unwrap_or_default(),
        })
        .await?;
    info!(user_id = %user.id, role = %user.role, by = %admin.id, "user created");

    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

/// Maps a guarded store write onto the HTTP error it stands for.
fn applied(write: UserWrite) -> ApiResult<User> {
    match write {
        UserWrite::Applied(user) => Ok(user),
        UserWrite::Missing => Err(ApiError::NotFound("User")),
        UserWrite::LastAdmin => Err(ApiError::LastAdmin),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> ApiResult<Json<PublicUser>> {
    let id = parse_id(&id, "User")?;
    let patch = UserPatch {
        role: payload.role,
        is_active: payload.is_active,
    };
    let user = applied(state.users.update(id, patch).await?)?;
    info!(user_id = %user.id, role = %user.role, active = user.is_active, by = %admin.id, "user updated");

    Ok(Json(PublicUser::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "User")?;
    let user = applied(state.users.soft_delete(id).await?)?;
    info!(user_id = %user.id, by = %admin.id, "user soft-deleted");

    Ok(Json(json!({ "msg": "User removed" })))
}
