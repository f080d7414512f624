//! Router harness over the in-memory stores.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;

use super::{api_router, AppState};
use crate::{
    auth::{Identity, PasswordHasher, TokenSigner, TOKEN_HEADER},
    db::memory::{MemoryContactStore, MemoryUserStore},
    model::{
        contact::{Contact, NewContact},
        user::{NewUser, Role, User},
    },
};

pub struct TestApp {
    pub state: AppState,
    router: NormalizePath<Router>,
}

impl TestApp {
    pub const PASSWORD: &'static str = "secret123";
    pub const ADMIN: &'static str = "root";

    pub fn new() -> Self {
        let state = AppState {
            users: Arc::new(MemoryUserStore::default()),
            contacts: Arc::new(MemoryContactStore::default()),
            tokens: Arc::new(TokenSigner::new("test-secret", Duration::days(7)).unwrap()),
            passwords: PasswordHasher::new(4),
        };
        let router = NormalizePath::trim_trailing_slash(api_router().with_state(state.clone()));
        Self { state, router }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Stores a user with [`Self::PASSWORD`] and returns it with a fresh token.
    pub async fn user(&self, username: &str, role: Role) -> (User, String) {
        let password_hash = self.state.passwords.hash(Self::PASSWORD.into()).await.unwrap();
        let user = self
            .state
            .users
            .insert(NewUser {
                username: username.to_string(),
                email: format!("{username}@galaxygrid.com"),
                password_hash,
                role,
            })
            .await
            .unwrap();
        let token = self.state.tokens.issue(Identity { id: user.id, role });
        (user, token)
    }

    pub async fn admin_token(&self) -> String {
        self.user(Self::ADMIN, Role::Admin).await.1
    }

    pub async fn contact(&self, name: &str) -> Contact {
        self.state
            .contacts
            .insert(NewContact {
                name: name.to_string(),
                email: format!("{}@x.com", name.to_lowercase().replace(' ', ".")),
                project_type: "Web".to_string(),
                message: "hello there".to_string(),
            })
            .await
            .unwrap()
    }
}
