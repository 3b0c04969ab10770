use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::warn;

use super::domain::{Declaration, DeclarationId};
use super::repository::{ContactRepository, DeclarationRepository, RepositoryError};
use super::service::{DeclarationService, DeclarationServiceError};
use super::validation::StepValidationError;

/// Header carrying the step index a PATCH body belongs to.
pub const WIZARD_STEP_HEADER: &str = "x-wizard-step";

/// Router builder exposing the declaration, draft, and contact endpoints.
pub fn declaration_router<R, C>(service: Arc<DeclarationService<R, C>>) -> Router
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    Router::new()
        .route("/api/declarations", post(create_handler::<R, C>))
        .route(
            "/api/declarations/:id",
            get(fetch_handler::<R, C>).patch(update_handler::<R, C>),
        )
        .route("/api/declarations/:id/submit", post(submit_handler::<R, C>))
        .route(
            "/api/declarations/:id/validate-step",
            post(validate_step_handler::<R, C>),
        )
        .route(
            "/api/declarations/:id/confirmation",
            get(confirmation_handler::<R, C>),
        )
        .route("/api/drafts", get(drafts_handler::<R, C>))
        .route("/api/drafts/:id", delete(delete_draft_handler::<R, C>))
        .route("/api/users", post(upsert_contact_handler::<R, C>))
        .route(
            "/api/users/by-phone/:phone",
            get(contact_by_phone_handler::<R, C>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    match service.create_from_json(&body) {
        Ok(record) => record_response(StatusCode::CREATED, &record),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fetch_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    Path(id): Path<i64>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    match service.get(DeclarationId(id)) {
        Ok(record) => record_response(StatusCode::OK, &record),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    let expected_version = match expected_version(&headers) {
        Ok(version) => version,
        Err(response) => return response,
    };
    let step = match wizard_step(&headers) {
        Ok(step) => step,
        Err(response) => return response,
    };

    let id = DeclarationId(id);
    let result = match step {
        Some(step) => service.save_step(id, step, &body, expected_version),
        None => service.update_from_json(id, &body, expected_version),
    };
    match result {
        Ok(record) => record_response(StatusCode::OK, &record),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    let expected_version = match expected_version(&headers) {
        Ok(version) => version,
        Err(response) => return response,
    };

    match service.submit(DeclarationId(id), &body, expected_version) {
        Ok(record) => record_response(StatusCode::OK, &record),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn validate_step_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    Path(_id): Path<i64>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    let Some(step) = body.get("step").and_then(Value::as_i64) else {
        let payload = json!({
            "valid": false,
            "errors": [{ "path": "step", "message": "step must be a whole number" }],
        });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };
    let empty = json!({});
    let data = body.get("data").unwrap_or(&empty);

    match service.validate_step(step, data) {
        Ok(slice) => {
            let payload = json!({ "valid": true, "data": slice });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error @ StepValidationError::InvalidStep { .. }) => {
            let payload = json!({
                "valid": false,
                "message": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(StepValidationError::Fields(errors)) => {
            let payload = json!({ "valid": false, "errors": errors });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn confirmation_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    Path(id): Path<i64>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    match service.confirmation(DeclarationId(id)) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn drafts_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    match service.drafts() {
        Ok(drafts) => (StatusCode::OK, axum::Json(drafts)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_draft_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    Path(id): Path<i64>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    match service.delete_draft(DeclarationId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(DeclarationServiceError::NotFound(_)) => {
            let payload = json!({ "message": "Draft not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn upsert_contact_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    match service.upsert_contact(&body) {
        Ok(contact) => (StatusCode::OK, axum::Json(contact)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn contact_by_phone_handler<R, C>(
    State(service): State<Arc<DeclarationService<R, C>>>,
    Path(phone): Path<String>,
) -> Response
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    match service.contact_by_phone(&phone) {
        Ok(contact) => (StatusCode::OK, axum::Json(contact)).into_response(),
        Err(error) => error_response(error),
    }
}

fn record_response(status: StatusCode, record: &Declaration) -> Response {
    let etag = format!("\"{}\"", record.version);
    (status, [(header::ETAG, etag)], axum::Json(record)).into_response()
}

fn error_response(error: DeclarationServiceError) -> Response {
    let status = error.status_code();
    let payload = match &error {
        DeclarationServiceError::Validation(errors) => json!({
            "message": "Invalid declaration data",
            "errors": errors,
        }),
        DeclarationServiceError::NotFound(_)
        | DeclarationServiceError::Repository(RepositoryError::NotFound) => {
            json!({ "message": "Declaration not found" })
        }
        DeclarationServiceError::ContactNotFound => json!({ "message": "User not found" }),
        DeclarationServiceError::Repository(RepositoryError::Unavailable(_)) => {
            warn!(%error, "declaration store failed");
            json!({ "message": error.to_string() })
        }
        _ => json!({ "message": error.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}

/// Optimistic-concurrency token from `If-Match`, accepting `3`, `"3"` or `W/"3"`.
fn expected_version(headers: &HeaderMap) -> Result<Option<u64>, Response> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .map(|raw| raw.trim().trim_start_matches("W/").trim_matches('"'))
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| bad_header("If-Match must carry a declaration version"))
}

fn wizard_step(headers: &HeaderMap) -> Result<Option<i64>, Response> {
    let Some(value) = headers.get(WIZARD_STEP_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| bad_header("X-Wizard-Step must be a step number"))
}

fn bad_header(message: &str) -> Response {
    let payload = json!({ "message": message });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}
