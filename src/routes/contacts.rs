use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::info;

use super::{
    extract::{Checks, ValidJson},
    AppState,
};
use crate::{
    error::ApiResult,
    model::contact::{NewContact, SubmitContactRequest, SubmitContactResponse},
};

// Public contact form, mounted at /api/contacts
pub fn contacts_router() -> Router<AppState> {
    Router::new().route("/", post(submit_contact))
}

fn validate(payload: SubmitContactRequest) -> ApiResult<NewContact> {
    let mut checks = Checks::default();
    let name = checks.required("name", payload.name, "Name is required");
    let email = checks.email("email", payload.email);
    let project_type = checks.required(
        "projectType",
        payload.project_type,
        "Project type is required",
    );
    let message = checks.required("message", payload.message, "Message is required");
    checks.finish()?;

    Ok(NewContact {
        name,
        email,
        project_type,
        message,
    })
}

pub async fn submit_contact(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SubmitContactRequest>,
) -> ApiResult<(StatusCode, Json<SubmitContactResponse>)> {
    let new_contact = validate(payload)?;
    let contact = state.contacts.insert(new_contact).await?;
    info!(contact_id = %contact.id, project_type = %contact.project_type, "contact submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitContactResponse {
            msg: "Contact form submitted successfully",
            contact,
        }),
    ))
}
