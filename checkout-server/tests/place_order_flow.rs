//! End-to-end saga behavior through the orchestrator

mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::time::Duration;

use checkout_server::payment::AuthorizationStatus;
use shared::ErrorCode;
use shared::order::OrderStatus;

#[tokio::test]
async fn test_synchronous_authorization_completes_order() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Authorized,
        "auth_1",
    )]);
    let inventory = MockInventory::ok();
    let notifier = MockNotifier::new();
    let state = test_state(gateway.clone(), inventory.clone(), notifier.clone());

    let receipt = state
        .orchestrator()
        .place_order("K1", sample_request())
        .await
        .unwrap();

    assert_eq!(receipt.status, OrderStatus::Completed);
    let order = state.orchestrator().order_status(&receipt.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.confirm_calls.load(Ordering::SeqCst), 1);
    assert_eq!(inventory.reserve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(inventory.release_calls.load(Ordering::SeqCst), 0);

    // Notification goes out in the background
    tokio::time::sleep(Duration::from_millis(50)).await;
    let sent = notifier.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, receipt.order_id);
    assert_eq!(sent[0].2, "ana@example.com");
}

#[tokio::test]
async fn test_replay_returns_same_receipt_without_side_effects() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Authorized,
        "auth_1",
    )]);
    let inventory = MockInventory::ok();
    let state = test_state(gateway.clone(), inventory.clone(), MockNotifier::new());

    let first = state
        .orchestrator()
        .place_order("K1", sample_request())
        .await
        .unwrap();
    let second = state
        .orchestrator()
        .place_order("K1", sample_request())
        .await
        .unwrap();

    assert_eq!(first.order_id, second.order_id);
    assert_eq!(second.status, OrderStatus::Completed);
    // No second authorization, reservation or attempt
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(inventory.reserve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        state
            .orchestrator()
            .attempts()
            .find_by_order(&first.order_id)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_decline_fails_order_and_releases_stock() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Declined,
        "auth_2",
    )]);
    let inventory = MockInventory::ok();
    let state = test_state(gateway.clone(), inventory.clone(), MockNotifier::new());

    let receipt = state
        .orchestrator()
        .place_order("K2", sample_request())
        .await
        .unwrap();

    assert_eq!(receipt.status, OrderStatus::Failed);
    assert_eq!(receipt.reason.as_deref(), Some("card declined"));
    let order = state.orchestrator().order_status(&receipt.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(inventory.release_calls.load(Ordering::SeqCst), 1);
    // Declines are never retried
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_insufficient_stock_fails_without_release() {
    let gateway = MockGateway::scripted(vec![]);
    let inventory = MockInventory::scripted(vec![MockReserve::Insufficient]);
    let state = test_state(gateway.clone(), inventory.clone(), MockNotifier::new());

    let receipt = state
        .orchestrator()
        .place_order("K3", sample_request())
        .await
        .unwrap();

    assert_eq!(receipt.status, OrderStatus::Failed);
    // Nothing was reserved, so nothing to compensate and no payment
    assert_eq!(inventory.release_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transient_failure_retries_then_succeeds() {
    let gateway = MockGateway::scripted(vec![
        MockAuth::Transient,
        MockAuth::Outcome(AuthorizationStatus::Authorized, "auth_3"),
    ]);
    let state = test_state(gateway.clone(), MockInventory::ok(), MockNotifier::new());

    let receipt = state
        .orchestrator()
        .place_order("K4", sample_request())
        .await
        .unwrap();

    assert_eq!(receipt.status, OrderStatus::Completed);
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 2);
    let attempts = state.orchestrator().attempts().find_by_order(&receipt.order_id);
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].retry_count, 1);
}

#[tokio::test]
async fn test_retry_budget_exhaustion_fails_and_compensates() {
    let gateway = MockGateway::scripted(vec![
        MockAuth::Transient,
        MockAuth::Transient,
        MockAuth::Transient,
    ]);
    let inventory = MockInventory::ok();
    let state = test_state(gateway.clone(), inventory.clone(), MockNotifier::new());

    let err = state
        .orchestrator()
        .place_order("K5", sample_request())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentProviderUnavailable);
    // Budget is three calls total
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 3);
    assert_eq!(inventory.release_calls.load(Ordering::SeqCst), 1);

    // The outcome is still recorded: a replay sees the failed receipt
    // instead of re-running the saga
    let replay = state
        .orchestrator()
        .place_order("K5", sample_request())
        .await
        .unwrap();
    assert_eq!(replay.status, OrderStatus::Failed);
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_pending_without_webhook_times_out_and_fails() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Pending,
        "auth_6",
    )]);
    // Status poll still reports pending
    let inventory = MockInventory::ok();
    let state = test_state(gateway.clone(), inventory.clone(), MockNotifier::new());

    let receipt = state
        .orchestrator()
        .place_order("K6", sample_request())
        .await
        .unwrap();
    assert_eq!(receipt.status, OrderStatus::Authorizing);

    // Wait past the webhook window and the poll
    tokio::time::sleep(Duration::from_millis(400)).await;

    let order = state.orchestrator().order_status(&receipt.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(gateway.status_calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(inventory.release_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pending_resolved_by_status_poll() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Pending,
        "auth_7",
    )]);
    gateway
        .status_script
        .lock()
        .push_back(MockAuth::Outcome(AuthorizationStatus::Authorized, "auth_7"));
    let state = test_state(gateway.clone(), MockInventory::ok(), MockNotifier::new());

    let receipt = state
        .orchestrator()
        .place_order("K7", sample_request())
        .await
        .unwrap();
    assert_eq!(receipt.status, OrderStatus::Authorizing);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let order = state.orchestrator().order_status(&receipt.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_empty_cart_rejected_before_side_effects() {
    let inventory = MockInventory::ok();
    let state = test_state(
        MockGateway::scripted(vec![]),
        inventory.clone(),
        MockNotifier::new(),
    );

    let mut request = sample_request();
    request.items.clear();

    let err = state
        .orchestrator()
        .place_order("K8", request)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(inventory.reserve_calls.load(Ordering::SeqCst), 0);

    // The key was not consumed: the same key works once the cart is valid
    let receipt = state
        .orchestrator()
        .place_order("K8", sample_request())
        .await
        .unwrap();
    assert_eq!(receipt.status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_malformed_replay_of_recorded_key_returns_stored_receipt() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Authorized,
        "auth_8",
    )]);
    let state = test_state(gateway.clone(), MockInventory::ok(), MockNotifier::new());

    let first = state
        .orchestrator()
        .place_order("K10", sample_request())
        .await
        .unwrap();
    assert_eq!(first.status, OrderStatus::Completed);

    // Even a broken replay body answers from the ledger
    let mut broken = sample_request();
    broken.items.clear();
    let replay = state
        .orchestrator()
        .place_order("K10", broken)
        .await
        .unwrap();
    assert_eq!(replay.order_id, first.order_id);
    assert_eq!(replay.status, OrderStatus::Completed);
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_compensation_failure_flags_reconciliation() {
    let gateway = MockGateway::scripted(vec![MockAuth::Outcome(
        AuthorizationStatus::Declined,
        "auth_9",
    )]);
    let inventory = MockInventory::ok();
    inventory.fail_release.store(true, Ordering::SeqCst);
    let state = test_state(gateway, inventory, MockNotifier::new());

    let receipt = state
        .orchestrator()
        .place_order("K9", sample_request())
        .await
        .unwrap();

    // The order still reaches its terminal state
    let order = state.orchestrator().order_status(&receipt.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.needs_reconciliation);
    assert_eq!(state.orchestrator().orders().find_flagged().len(), 1);
}
