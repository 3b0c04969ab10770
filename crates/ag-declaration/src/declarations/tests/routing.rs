use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::declarations::{DeclarationPatch, DeclarationService, StepLayout, WIZARD_STEP_HEADER};

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn create_route_returns_record_with_defaults() {
    let (service, _) = build_service(StepLayout::Full);
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/declarations",
            &json!({ "travelerType": "visitor", "numberOfPeople": 2 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers().get(header::ETAG).map(|value| value.as_bytes()),
        Some(b"\"1\"".as_slice())
    );
    let payload = read_json_body(response).await;
    assert_eq!(payload["id"], 1);
    assert_eq!(payload["islands"], json!([]));
    assert_eq!(payload["plantItems"], json!([]));
    assert_eq!(payload["isSubmitted"], false);
    assert_eq!(payload["language"], "en");
}

#[tokio::test]
async fn get_route_returns_not_found() {
    let (service, _) = build_service(StepLayout::Full);
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/declarations/41")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_route_reports_field_errors() {
    let (service, _) = build_service(StepLayout::Full);
    let created = service.create(&DeclarationPatch::default()).expect("create");
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "PATCH",
            &format!("/api/declarations/{}", created.id),
            &json!({ "travelerType": "tourist" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["message"].is_string());
    assert_eq!(payload["errors"][0]["path"], "travelerType");
}

#[tokio::test]
async fn patch_route_validates_against_the_named_step() {
    let (service, _) = build_service(StepLayout::Full);
    let created = service.create(&DeclarationPatch::default()).expect("create");
    let router = router_with_service(service);

    let mut request = json_request(
        "PATCH",
        &format!("/api/declarations/{}", created.id),
        &json!({ "arrivalMethod": "ship", "shipName": "Pride of America" }),
    );
    request
        .headers_mut()
        .insert(WIZARD_STEP_HEADER, "3".parse().expect("header value"));

    let response = router.oneshot(request).await.expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["errors"][0]["path"], "departureLocation");
}

#[tokio::test]
async fn patch_route_contact_step_links_a_contact() {
    let (service, _) = build_service(StepLayout::Full);
    let created = service.create(&DeclarationPatch::default()).expect("create");
    let router = router_with_service(service);

    let mut request = json_request(
        "PATCH",
        &format!("/api/declarations/{}", created.id),
        &contact_payload(),
    );
    request
        .headers_mut()
        .insert(WIZARD_STEP_HEADER, "8".parse().expect("header value"));

    let response = router.clone().oneshot(request).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert!(payload["userId"].is_i64());
    assert_eq!(payload["version"], 2);

    let found = router
        .oneshot(
            Request::get("/api/users/by-phone/4155550123")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(found.status(), StatusCode::OK);
    let contact = read_json_body(found).await;
    assert_eq!(contact["id"], payload["userId"]);
}

#[tokio::test]
async fn patch_route_rejects_stale_if_match() {
    let (service, _) = build_service(StepLayout::Full);
    let created = service.create(&DeclarationPatch::default()).expect("create");
    service
        .update_from_json(created.id, &json!({ "language": "zh" }), None)
        .expect("update");
    let router = router_with_service(service);

    let mut request = json_request(
        "PATCH",
        &format!("/api/declarations/{}", created.id),
        &json!({ "language": "es" }),
    );
    request
        .headers_mut()
        .insert(header::IF_MATCH, "\"1\"".parse().expect("header value"));

    let response = router.oneshot(request).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_route_requires_attestation() {
    let (service, _) = build_service(StepLayout::Full);
    let created = service.create(&DeclarationPatch::default()).expect("create");
    let router = router_with_service(service);

    let rejected = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/declarations/{}/submit", created.id),
            &json!({ "certificationAccepted": true }),
        ))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let accepted = router
        .oneshot(json_request(
            "POST",
            &format!("/api/declarations/{}/submit", created.id),
            &attestation(),
        ))
        .await
        .expect("route executes");
    assert_eq!(accepted.status(), StatusCode::OK);
    let payload = read_json_body(accepted).await;
    assert_eq!(payload["isSubmitted"], true);
    assert!(payload["submittedAt"].is_string());
}

#[tokio::test]
async fn validate_step_route_is_a_dry_run() {
    let (service, repository) = build_service(StepLayout::Full);
    let created = service.create(&DeclarationPatch::default()).expect("create");
    let router = router_with_service(service);

    let valid = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/declarations/{}/validate-step", created.id),
            &json!({
                "step": 3,
                "data": {
                    "arrivalMethod": "flight",
                    "flightNumber": "HA123",
                    "airline": "Hawaiian Airlines",
                },
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(valid.status(), StatusCode::OK);
    let payload = read_json_body(valid).await;
    assert_eq!(payload["valid"], true);
    assert_eq!(payload["data"]["flightNumber"], "HA123");

    let invalid = router
        .oneshot(json_request(
            "POST",
            &format!("/api/declarations/{}/validate-step", created.id),
            &json!({ "step": 4, "data": { "islands": [] } }),
        ))
        .await
        .expect("route executes");
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(invalid).await;
    assert_eq!(payload["valid"], false);
    assert_eq!(payload["errors"][0]["path"], "islands");

    let stored = crate::declarations::DeclarationRepository::fetch(repository.as_ref(), created.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.fields.arrival_method, None);
}

#[tokio::test]
async fn validate_step_route_rejects_unknown_steps() {
    let (service, _) = build_service(StepLayout::Standard);
    let router = router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/declarations/1/validate-step",
            &json!({ "step": 8, "data": {} }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["valid"], false);
    assert!(payload["message"]
        .as_str()
        .is_some_and(|message| message.contains("invalid step")));
}

#[tokio::test]
async fn draft_routes_list_and_delete() {
    let (service, _) = build_service(StepLayout::Full);
    let draft = service.create(&DeclarationPatch::default()).expect("create");
    let router = router_with_service(service);

    let listed = router
        .clone()
        .oneshot(Request::get("/api/drafts").body(Body::empty()).expect("request"))
        .await
        .expect("route executes");
    assert_eq!(listed.status(), StatusCode::OK);
    let payload = read_json_body(listed).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));

    let uri = format!("/api/drafts/{}", draft.id);
    let deleted = router
        .clone()
        .oneshot(Request::delete(uri.as_str()).body(Body::empty()).expect("request"))
        .await
        .expect("route executes");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let missing = router
        .oneshot(Request::delete(uri.as_str()).body(Body::empty()).expect("request"))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_routes_upsert_and_lookup() {
    let (service, _) = build_service(StepLayout::Full);
    let router = router_with_service(service);

    let created = router
        .clone()
        .oneshot(json_request("POST", "/api/users", &contact_payload()))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::OK);

    let found = router
        .clone()
        .oneshot(
            Request::get("/api/users/by-phone/4155550123")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(found.status(), StatusCode::OK);
    let payload = read_json_body(found).await;
    assert_eq!(payload["fullName"], "Leilani Akana");

    let missing = router
        .oneshot(
            Request::get("/api/users/by-phone/0000000000")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn confirmation_handler_conflicts_for_drafts() {
    let (service, _) = build_service(StepLayout::Full);
    let draft = service.create(&DeclarationPatch::default()).expect("create");

    let response = crate::declarations::router::confirmation_handler::<
        crate::declarations::InMemoryDeclarationRepository,
        crate::declarations::InMemoryContactRepository,
    >(State(Arc::new(service)), Path(draft.id.0))
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn drafts_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(DeclarationService::new(
        Arc::new(UnavailableRepository),
        Arc::new(UnavailableRepository),
        StepLayout::Full,
    ));

    let response = crate::declarations::router::drafts_handler::<
        UnavailableRepository,
        UnavailableRepository,
    >(State(service))
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
