//! Request authentication.
//!
//! [`AuthUser`] proves the caller holds a valid token; [`AdminUser`]
//! additionally requires the admin role. Both are extractors, so a handler
//! that names one in its signature cannot run without the check passing.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::{error::ApiError, model::user::Role, routes::AppState};

pub mod password;
pub mod token;

pub use password::PasswordHasher;
pub use token::{Identity, TokenSigner};

/// Header the admin client sends its token in.
pub const TOKEN_HEADER: &str = "x-auth-token";

const NO_TOKEN: &str = "No token, authorization denied";
const BAD_TOKEN: &str = "Token is not valid";

/// Reads the token from `x-auth-token`, falling back to `Authorization: Bearer`.
fn token_from(parts: &Parts) -> Option<&str> {
    let custom = parts
        .headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty());

    custom.or_else(|| {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

/// Checks `token` and returns the identity it was issued for.
pub fn authenticate(signer: &TokenSigner, token: Option<&str>) -> Result<Identity, ApiError> {
    let token = token.ok_or(ApiError::Unauthorized(NO_TOKEN))?;
    signer.verify(token).map_err(|err| {
        debug!(error = %err, "rejected token");
        ApiError::Unauthorized(BAD_TOKEN)
    })
}

pub fn authorize(identity: &Identity, required: Role) -> Result<(), ApiError> {
    if identity.role == required {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(&state.tokens, token_from(parts)).map(AuthUser)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        authorize(&identity, Role::Admin)?;
        Ok(AdminUser(identity))
    }
}
