use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::{
    error::{ApiError, FieldError},
    model::user::normalize_email,
};

/// `Json<T>` whose rejections come back as JSON validation errors instead of
/// axum's plain-text bodies.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ValidJson(value))
    }
}

/// Malformed ids can never name a stored record, so they read as not found.
pub fn parse_id(raw: &str, what: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(what))
}

/// Collects field errors for one request body.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    /// Trimmed value, or an error for `field` if it is missing or blank.
    pub fn required(&mut self, field: &str, value: Option<String>, msg: &str) -> String {
        let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
        if value.is_empty() {
            self.errors.push(FieldError::new(field, msg));
        }
        value
    }

    /// The value exactly as sent, or an error if it is missing or empty.
    /// Secrets go through here so padding survives to the hash check.
    pub fn present(&mut self, field: &str, value: Option<String>, msg: &str) -> String {
        let value = value.unwrap_or_default();
        if value.is_empty() {
            self.errors.push(FieldError::new(field, msg));
        }
        value
    }

    /// Trimmed, lowercased address, or an error if it is not a valid email.
    pub fn email(&mut self, field: &str, value: Option<String>) -> String {
        let value = value.as_deref().map(normalize_email).unwrap_or_default();
        if !value.as_str().validate_email() {
            self.errors
                .push(FieldError::new(field, "Please include a valid email"));
        }
        value
    }

    pub fn min_len(&mut self, field: &str, value: Option<String>, min: usize, msg: &str) -> String {
        let value = value.unwrap_or_default();
        if value.chars().count() < min {
            self.errors.push(FieldError::new(field, msg));
        }
        value
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}
