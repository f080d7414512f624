use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, warn};

use super::{
    extract::{Checks, ValidJson},
    AppState,
};
use crate::{
    auth::{AuthUser, Identity},
    db::UserFilter,
    error::{ApiError, ApiResult},
    model::user::{LoginRequest, LoginResponse, LoginUser, PublicUser},
};

// Auth routes, mounted at /api/auth
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
}

/// Unknown email, inactive account and wrong password all answer with the
/// same `InvalidCredentials`; only the log line tells them apart.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let mut checks = Checks::default();
    let email = checks.email("email", payload.email);
    let password = checks.present("password", payload.password, "Password is required");
    checks.finish()?;

    let Some(user) = state
        .users
        .find_one_non_deleted(&UserFilter::email(email.clone()))
        .await?
    else {
        warn!(%email, "login failed: no such user");
        return Err(ApiError::InvalidCredentials);
    };

    if !user.is_active {
        warn!(%email, "login failed: account is deactivated");
        return Err(ApiError::InvalidCredentials);
    }

    if !state
        .passwords
        .verify(password, user.password_hash.clone())
        .await?
    {
        warn!(%email, "login failed: password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.tokens.issue(Identity {
        id: user.id,
        role: user.role,
    });
    info!(user_id = %user.id, "user authenticated");

    Ok(Json(LoginResponse {
        token,
        user: LoginUser::from(&user),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = state
        .users
        .find_one_non_deleted(&UserFilter::id(identity.id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(PublicUser::from(user)))
}
