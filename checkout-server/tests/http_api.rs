//! HTTP surface test against a live listener

mod common;

use common::*;
use std::time::Duration;

use checkout_server::api;
use checkout_server::payment::AuthorizationStatus;
use checkout_server::webhook::sign_payload;
use shared::order::OrderStatus;

async fn serve(state: checkout_server::ServerState) -> String {
    let app = api::build_app().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn cart_body() -> serde_json::Value {
    serde_json::json!({
        "customer_id": "cust-1",
        "items": [{
            "product_id": "prod-1",
            "name": "4K Monitor",
            "quantity": 1,
            "unit_price": "999.99"
        }],
        "currency": "EUR",
        "shipping_address": {
            "first_name": "Ana",
            "last_name": "Lopez",
            "street": "1 Main St",
            "city": "Madrid",
            "state": "MD",
            "zip_code": "28001",
            "country": "ES",
            "email": "ana@example.com"
        },
        "billing_address": {
            "first_name": "Ana",
            "last_name": "Lopez",
            "street": "1 Main St",
            "city": "Madrid",
            "state": "MD",
            "zip_code": "28001",
            "country": "ES"
        }
    })
}

#[tokio::test]
async fn test_checkout_round_trip_over_http() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Authorized,
        "auth_h1",
    )]);
    let state = test_state(gateway, MockInventory::ok(), MockNotifier::new());
    let base = serve(state).await;
    let client = reqwest::Client::new();

    // Missing idempotency key is rejected before any side effect
    let response = client
        .post(format!("{base}/orders"))
        .json(&cart_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{base}/orders"))
        .header("Idempotency-Key", "H1")
        .json(&cart_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "COMPLETED");
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    // Snapshot endpoint
    let response = client
        .get(format!("{base}/orders/{order_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "COMPLETED");
    assert_eq!(body["data"]["total"], "999.99");

    // Unknown order is a 404
    let response = client
        .get(format!("{base}/orders/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_webhook_over_http_requires_valid_signature() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Pending,
        "auth_h2",
    )]);
    // Generous webhook window so the timeout poller stays out of the way
    let mut config = test_config();
    config.webhook_timeout_ms = 5_000;
    let state = checkout_server::ServerState::with_collaborators(
        &config,
        gateway,
        MockInventory::ok(),
        MockNotifier::new(),
    );
    let secret = state.config().webhook_secret.clone();
    let orchestrator = state.orchestrator().clone();
    let base = serve(state).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/orders"))
        .header("Idempotency-Key", "H2")
        .json(&cart_body())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "AUTHORIZING");
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    let event = serde_json::json!({
        "event_id": "evt_h1",
        "type": "payment.authorized",
        "external_ref": "auth_h2"
    })
    .to_string();

    // Tampered signature is rejected
    let response = client
        .post(format!("{base}/webhooks/payment"))
        .header("x-webhook-signature", sign_payload("wrong-secret", event.as_bytes()))
        .body(event.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Properly signed event completes the order
    let response = client
        .post(format!("{base}/webhooks/payment"))
        .header("x-webhook-signature", sign_payload(&secret, event.as_bytes()))
        .body(event)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let order = orchestrator.order_status(&order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
}
