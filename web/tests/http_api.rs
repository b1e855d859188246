//! HTTP contract tests driven through the router with `oneshot`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use seatflow_core::{Channel, DataStore, PaymentStatus};
use seatflow_testing::{GatewayScript, TestWorld};
use seatflow_web::{AppState, CORRELATION_ID_HEADER, TENANT_HEADER, USER_HEADER, build_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn app(world: &TestWorld) -> Router {
    build_router(AppState::new(
        world.store.clone() as Arc<dyn DataStore>,
        Arc::clone(&world.orchestrator),
        Arc::clone(&world.ledger),
        Arc::clone(&world.webhooks),
    ))
}

fn request(
    method: Method,
    uri: &str,
    tenant: Option<String>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_HEADER, Uuid::new_v4().to_string());
    if let Some(tenant) = tenant {
        builder = builder.header(TENANT_HEADER, tenant);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn booking_body(world: &TestWorld, start_hour: i64, end_hour: i64) -> Value {
    json!({
        "libraryId": world.library_id,
        "seatId": world.seat.id,
        "startTime": world.at(start_hour).to_rfc3339(),
        "endTime": world.at(end_hour).to_rfc3339(),
    })
}

async fn book(
    world: &TestWorld,
    app: &Router,
    start_hour: i64,
    end_hour: i64,
) -> (StatusCode, Value) {
    send(
        app,
        request(
            Method::POST,
            "/bookings",
            Some(world.tenant.id.to_string()),
            Some(booking_body(world, start_hour, end_hour)),
        ),
    )
    .await
}

#[tokio::test]
async fn test_create_conflict_and_adjacent_booking() {
    let world = TestWorld::new();
    let app = app(&world);

    let (status, body) = book(&world, &app, 10, 12).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["paymentGateway"], "gatewayA");
    assert_eq!(body["amount"], 10_000);
    assert!(body["bookingId"].is_string());

    let (status, body) = book(&world, &app, 11, 13).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");

    let (status, _) = book(&world, &app, 12, 14).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_payment_failure_is_402() {
    let world = TestWorld::new();
    world.gateway_a.push(GatewayScript::Fail("unavailable".to_string()));
    world.gateway_b.push(GatewayScript::Fail("unavailable".to_string()));
    let app = app(&world);

    let (status, body) = book(&world, &app, 10, 12).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "PAYMENT_FAILED");
}

#[tokio::test]
async fn test_invalid_requests_are_400() {
    let world = TestWorld::new();
    let app = app(&world);

    let (status, body) = book(&world, &app, 12, 10).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let mut with_preference = booking_body(&world, 10, 12);
    with_preference["paymentPreference"] = json!("gatewayC");
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/bookings",
            Some(world.tenant.id.to_string()),
            Some(with_preference),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/bookings",
            Some(world.tenant.id.to_string()),
            Some(json!({ "seatId": "not-a-uuid" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_payment_preference_is_honoured() {
    let world = TestWorld::new();
    let app = app(&world);

    let mut body = booking_body(&world, 10, 12);
    body["paymentPreference"] = json!("gatewayB");
    let (status, body) = send(
        &app,
        request(Method::POST, "/bookings", Some(world.tenant.id.to_string()), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["paymentGateway"], "gatewayB");
}

#[tokio::test]
async fn test_tenant_header_is_required_and_resolved() {
    let world = TestWorld::new();
    let app = app(&world);

    let (status, body) = send(
        &app,
        request(Method::POST, "/bookings", None, Some(booking_body(&world, 10, 12))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/bookings",
            Some(Uuid::new_v4().to_string()),
            Some(booking_body(&world, 10, 12)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cancel_returns_refund_amount() {
    let world = TestWorld::new();
    let app = app(&world);
    let (_, created) = book(&world, &app, 10, 12).await;
    let uri = format!("/bookings/{}", created["bookingId"].as_str().unwrap());

    let (status, body) = send(
        &app,
        request(Method::DELETE, &uri, Some(world.tenant.id.to_string()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refundAmount"], 9_000);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = send(
        &app,
        request(Method::DELETE, &uri, Some(world.tenant.id.to_string()), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn test_booking_details_include_payment_history() {
    let world = TestWorld::new();
    world.gateway_a.push(GatewayScript::Hang);
    let app = app(&world);
    let (status, created) = book(&world, &app, 10, 12).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["paymentGateway"], "gatewayB");

    let uri = format!("/bookings/{}", created["bookingId"].as_str().unwrap());
    let (status, body) = send(
        &app,
        request(Method::GET, &uri, Some(world.tenant.id.to_string()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    let payments = body["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0]["status"], "failed");
    assert_eq!(payments[0]["gateway"], "gatewayA");
    assert_eq!(payments[1]["status"], "success");
    assert_eq!(payments[1]["attempt"], 2);
}

#[tokio::test]
async fn test_other_tenant_is_forbidden() {
    let world = TestWorld::new();
    let intruder = world.add_tenant();
    let app = app(&world);
    let (_, created) = book(&world, &app, 10, 12).await;
    let uri = format!("/bookings/{}", created["bookingId"].as_str().unwrap());

    let (status, body) = send(
        &app,
        request(Method::GET, &uri, Some(intruder.id.to_string()), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "TENANT_ISOLATION_VIOLATION");
    assert!(!body["message"].as_str().unwrap().contains(&world.tenant.id.to_string()));
}

#[tokio::test]
async fn test_lifecycle_endpoints() {
    let world = TestWorld::new();
    let app = app(&world);
    let (_, created) = book(&world, &app, 10, 12).await;
    let id = created["bookingId"].as_str().unwrap().to_string();
    let tenant = world.tenant.id.to_string();

    let (status, body) = send(
        &app,
        request(Method::POST, &format!("/bookings/{id}/check-out"), Some(tenant.clone()), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INVALID_STATE_TRANSITION");

    for (step, expected) in [
        ("check-in", "checked_in"),
        ("check-out", "checked_out"),
        ("complete", "completed"),
    ] {
        let (status, body) = send(
            &app,
            request(Method::POST, &format!("/bookings/{id}/{step}"), Some(tenant.clone()), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{step}");
        assert_eq!(body["status"], expected);
    }
}

#[tokio::test]
async fn test_availability() {
    let world = TestWorld::new();
    let app = app(&world);
    book(&world, &app, 10, 12).await;

    let query = |start: i64, end: i64| {
        format!(
            "/seats/{}/availability?start={}&end={}",
            world.seat.id,
            world.at(start).format("%Y-%m-%dT%H:%M:%SZ"),
            world.at(end).format("%Y-%m-%dT%H:%M:%SZ"),
        )
    };

    let (status, body) = send(
        &app,
        request(Method::GET, &query(11, 13), Some(world.tenant.id.to_string()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);

    let (_, body) = send(
        &app,
        request(Method::GET, &query(12, 13), Some(world.tenant.id.to_string()), None),
    )
    .await;
    assert_eq!(body["available"], true);
}

#[tokio::test]
async fn test_webhook_signature_is_checked() {
    let world = TestWorld::new();
    let app = app(&world);
    book(&world, &app, 10, 12).await;

    let forged = world
        .gateway_b
        .webhook("gatewayA_order_1", PaymentStatus::Failed);
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/webhooks/gatewayA",
            None,
            Some(serde_json::to_value(&forged).unwrap()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_SIGNATURE");

    let replay = world
        .gateway_a
        .webhook("gatewayA_order_1", PaymentStatus::Success);
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/webhooks/gatewayA",
            None,
            Some(serde_json::to_value(&replay).unwrap()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "duplicate");
}

#[tokio::test]
async fn test_unknown_gateway_name_is_400() {
    let world = TestWorld::new();
    let app = app(&world);
    let event = world.gateway_a.webhook("x", PaymentStatus::Success);

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/webhooks/paypal",
            None,
            Some(serde_json::to_value(&event).unwrap()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_internal_debit() {
    let world = TestWorld::new();
    world.store.set_balance(world.tenant.id, Channel::Whatsapp, 5);
    let app = app(&world);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/internal/credits/debit",
            None,
            Some(json!({ "tenantId": world.tenant.id, "channel": "whatsapp", "units": 10 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body, json!({ "ok": false, "remaining": 5 }));

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/internal/credits/debit",
            None,
            Some(json!({ "tenantId": world.tenant.id, "channel": "whatsapp", "units": 3 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "remaining": 2 }));

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/internal/credits/debit",
            None,
            Some(json!({ "tenantId": world.tenant.id, "channel": "whatsapp", "units": 3 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body, json!({ "ok": false, "remaining": 2 }));
}

#[tokio::test]
async fn test_top_up_and_balances() {
    let world = TestWorld::new();
    let app = app(&world);
    let tenant = world.tenant.id.to_string();

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/credits/top-up",
            Some(tenant.clone()),
            Some(json!({ "channel": "email", "units": 40 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 40);

    let (status, body) = send(&app, request(Method::GET, "/credits", Some(tenant), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], 40);
    assert_eq!(body["sms"], 100);
}

#[tokio::test]
async fn test_responses_carry_correlation_id() {
    let world = TestWorld::new();
    let app = app(&world);
    let id = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(CORRELATION_ID_HEADER, id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CORRELATION_ID_HEADER].to_str().unwrap(),
        id.to_string()
    );
}
