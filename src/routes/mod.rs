use std::sync::Arc;

use axum::{
    extract::State,
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::error;

use crate::{
    auth::{PasswordHasher, TokenSigner},
    db::{ContactStore, UserStore},
    error::ApiError,
};

pub mod admin;
pub mod auth;
pub mod contacts;
pub mod extract;
#[cfg(test)]
pub mod test_support;
pub mod users;

use admin::admin_router;
use auth::auth_router;
use contacts::contacts_router;

/// Everything a handler may touch, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub tokens: Arc<TokenSigner>,
    pub passwords: PasswordHasher,
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/contacts", contacts_router())
        .nest("/api/auth", auth_router())
        .nest("/api/admin", admin_router())
        .route("/api", get(index))
        .route("/api/health", get(health))
        // Keep unknown API paths out of the static fallback
        .route("/api/*rest", any(api_not_found))
}

async fn index() -> Json<Value> {
    Json(json!({ "msg": "Galaxy Grid Server API" }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    if let Err(err) = state.users.ping().await {
        error!(error = %err, "DB health check failed");
        return Json(json!({ "status": "error", "db": "down" }));
    }
    Json(json!({ "status": "ok", "db": "up" }))
}

async fn api_not_found() -> ApiError {
    ApiError::NotFound("API endpoint")
}
