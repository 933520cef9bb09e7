//! Checkout orchestrator
//!
//! Drives a single order through reserve, authorize, confirm or
//! compensate, and notify. The orchestrator owns the retry/backoff
//! policy for the payment provider and the compensation policy for
//! reserved stock; all order mutation goes through the version-checked
//! state machine.
//!
//! The saga runs on a detached task: a client that disconnects while
//! waiting does not abandon an authorization mid-flight.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{Address, LineItem, Order, OrderStatus, OrderTransition};
use shared::payment::AttemptStatus;

use crate::inventory::{InventoryClient, ReserveOutcome};
use crate::ledger::{IdempotencyLedger, Permit, Reservation};
use crate::notify::{self, NotificationDispatcher, NotificationKind};
use crate::orders::OrderStore;
use crate::payment::{
    AttemptStore, AuthorizationRequest, AuthorizationStatus, GatewayError, PaymentGateway,
};

/// Bounded exponential backoff for transient provider failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry)
    }
}

/// Checkout request body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1))]
    pub customer_id: String,
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<LineItem>,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub shipping_address: Address,
    pub billing_address: Address,
}

/// Stable result of a checkout, also the ledger payload for replays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderReceipt {
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Saga coordinator, cheap to clone (all fields are shared handles)
#[derive(Clone)]
pub struct Orchestrator {
    orders: Arc<OrderStore>,
    attempts: Arc<AttemptStore>,
    ledger: IdempotencyLedger,
    gateway: Arc<dyn PaymentGateway>,
    inventory: Arc<dyn InventoryClient>,
    notifier: Arc<dyn NotificationDispatcher>,
    retry: RetryPolicy,
    webhook_timeout: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<OrderStore>,
        attempts: Arc<AttemptStore>,
        ledger: IdempotencyLedger,
        gateway: Arc<dyn PaymentGateway>,
        inventory: Arc<dyn InventoryClient>,
        notifier: Arc<dyn NotificationDispatcher>,
        retry: RetryPolicy,
        webhook_timeout: Duration,
    ) -> Self {
        Self {
            orders,
            attempts,
            ledger,
            gateway,
            inventory,
            notifier,
            retry,
            webhook_timeout,
        }
    }

    pub fn orders(&self) -> &OrderStore {
        &self.orders
    }

    pub fn attempts(&self) -> &AttemptStore {
        &self.attempts
    }

    pub fn ledger(&self) -> &IdempotencyLedger {
        &self.ledger
    }

    /// Entry point for a checkout request
    ///
    /// Replays with a previously seen idempotency key return the stored
    /// receipt without re-executing any side effect. A fresh key runs
    /// the saga on a detached task so client disconnection cannot
    /// abandon an authorization in flight.
    pub async fn place_order(
        &self,
        idempotency_key: &str,
        request: PlaceOrderRequest,
    ) -> AppResult<PlaceOrderReceipt> {
        let scoped = format!("place_order:{idempotency_key}");
        match self.ledger.reserve(&scoped).await? {
            // A recorded key answers from the ledger even if the replay
            // body is malformed
            Reservation::Completed(stored) => serde_json::from_value(stored).map_err(|e| {
                AppError::internal(format!("corrupt idempotency record for {scoped}: {e}"))
            }),
            Reservation::Fresh(permit) => {
                // Reject malformed carts before any side effect; the
                // dropped permit releases the key for a corrected retry
                request
                    .validate()
                    .map_err(|e| AppError::validation(e.to_string()))?;
                validate_items(&request.items)?;

                let this = self.clone();
                let key = idempotency_key.to_string();
                let saga = tokio::spawn(async move { this.run_saga(permit, key, request).await });
                saga.await
                    .map_err(|e| AppError::internal(format!("saga task failed: {e}")))?
            }
        }
    }

    /// Current order snapshot
    pub fn order_status(&self, order_id: &str) -> AppResult<Order> {
        self.orders.get(order_id).ok_or_else(|| {
            AppError::with_message(ErrorCode::OrderNotFound, format!("order {order_id} not found"))
        })
    }

    async fn run_saga(
        &self,
        permit: Permit,
        idempotency_key: String,
        request: PlaceOrderRequest,
    ) -> AppResult<PlaceOrderReceipt> {
        let order = Order::new(
            request.customer_id,
            request.items,
            request.currency,
            request.shipping_address,
            request.billing_address,
        );
        let order_id = order.order_id.clone();
        let amount = order.total;
        let currency = order.currency.clone();
        self.orders.insert(order.clone());

        tracing::info!(order_id, customer_id = %order.customer_id, %amount, "Checkout accepted");

        // Hold stock before any money moves
        match self.reserve_stock_with_retry(&order_id, &order.items).await {
            Ok(ReserveOutcome::Ok) => {
                self.apply_transition(&order_id, OrderTransition::Reserve)?;
            }
            Ok(ReserveOutcome::Insufficient { detail }) => {
                self.apply_transition(&order_id, OrderTransition::ReservationRejected)?;
                let receipt = PlaceOrderReceipt {
                    order_id: order_id.clone(),
                    status: OrderStatus::Failed,
                    reason: Some(format!("insufficient stock: {detail}")),
                };
                permit.commit(json!(&receipt));
                self.notify_terminal(&order_id, NotificationKind::OrderFailed);
                return Ok(receipt);
            }
            Err(e) => {
                self.apply_transition(&order_id, OrderTransition::ReservationRejected)?;
                let receipt = PlaceOrderReceipt {
                    order_id: order_id.clone(),
                    status: OrderStatus::Failed,
                    reason: Some("inventory service unavailable".to_string()),
                };
                permit.commit(json!(&receipt));
                self.notify_terminal(&order_id, NotificationKind::OrderFailed);
                return Err(AppError::upstream(format!("stock reservation failed: {e}"))
                    .with_detail("order_id", order_id));
            }
        }

        let attempt = self
            .attempts
            .create(&order_id, &idempotency_key, amount, &currency)?;
        let attempt_id = attempt.attempt_id.clone();

        self.apply_transition(&order_id, OrderTransition::StartAuthorization)?;

        let auth_request = AuthorizationRequest {
            amount,
            currency,
            idempotency_key: idempotency_key.clone(),
            metadata: [("order_id".to_string(), order_id.clone())].into(),
        };

        let outcome = self
            .with_retry(&attempt_id, || {
                self.gateway.create_authorization(&auth_request)
            })
            .await;

        match outcome {
            Ok(outcome) => {
                self.attempts
                    .assign_external_ref(&attempt_id, &outcome.external_ref)?;
                match outcome.status {
                    AuthorizationStatus::Authorized => {
                        if let Err(e) = self.finalize_authorized(&attempt_id).await {
                            // Money is authorized but capture failed.
                            // The key must stay consumed so a replay
                            // cannot open a second authorization.
                            let receipt = PlaceOrderReceipt {
                                order_id,
                                status: OrderStatus::Authorizing,
                                reason: Some("capture pending reconciliation".to_string()),
                            };
                            permit.commit(json!(&receipt));
                            return Err(e);
                        }
                        let receipt = PlaceOrderReceipt {
                            order_id,
                            status: OrderStatus::Completed,
                            reason: None,
                        };
                        permit.commit(json!(&receipt));
                        Ok(receipt)
                    }
                    AuthorizationStatus::Declined => {
                        let reason = outcome
                            .reason
                            .unwrap_or_else(|| "authorization declined".to_string());
                        self.fail_attempt(
                            &attempt_id,
                            AttemptStatus::Declined,
                            OrderTransition::AuthorizationDeclined,
                        )
                        .await?;
                        let receipt = PlaceOrderReceipt {
                            order_id,
                            status: OrderStatus::Failed,
                            reason: Some(reason),
                        };
                        permit.commit(json!(&receipt));
                        Ok(receipt)
                    }
                    AuthorizationStatus::Pending => {
                        // Resolution arrives via webhook or the timeout
                        // poller; the caller sees AUTHORIZING now
                        let receipt = PlaceOrderReceipt {
                            order_id: order_id.clone(),
                            status: OrderStatus::Authorizing,
                            reason: None,
                        };
                        permit.commit(json!(&receipt));
                        self.spawn_resolution(attempt_id);
                        Ok(receipt)
                    }
                }
            }
            Err(e) => {
                let transition = if e.is_transient() {
                    // Retry budget exhausted without a definitive answer
                    OrderTransition::AuthorizationTimedOut
                } else {
                    OrderTransition::AuthorizationDeclined
                };
                self.fail_attempt(&attempt_id, AttemptStatus::Failed, transition)
                    .await?;
                let receipt = PlaceOrderReceipt {
                    order_id: order_id.clone(),
                    status: OrderStatus::Failed,
                    reason: Some(e.to_string()),
                };
                permit.commit(json!(&receipt));
                if e.is_transient() {
                    Err(AppError::upstream(e.to_string()).with_detail("order_id", order_id))
                } else {
                    Ok(receipt)
                }
            }
        }
    }

    /// Resolve an attempt the provider reported `authorized`
    ///
    /// Safe against the webhook/poller race: only the caller that moves
    /// the attempt out of PENDING drives the order transitions. Returns
    /// the completed order, or `None` when the attempt was already
    /// resolved.
    pub async fn finalize_authorized(&self, attempt_id: &str) -> AppResult<Option<Order>> {
        if !self
            .attempts
            .mark_if_pending(attempt_id, AttemptStatus::Authorized)
        {
            return Ok(None);
        }
        let attempt = self.attempts.get(attempt_id).ok_or_else(|| {
            AppError::with_message(
                ErrorCode::UnknownAttempt,
                format!("attempt {attempt_id} not found"),
            )
        })?;
        let order_id = attempt.order_id.clone();

        if let Some(external_ref) = attempt.external_ref.as_deref() {
            let confirmed = self
                .with_retry(attempt_id, || self.gateway.confirm_authorization(external_ref))
                .await;
            if let Err(e) = confirmed {
                tracing::error!(
                    order_id,
                    attempt_id,
                    external_ref,
                    "Capture failed after authorization: {e}"
                );
                let _ = self.orders.flag_reconciliation(&order_id);
                return Err(AppError::upstream(format!("capture failed: {e}"))
                    .with_detail("order_id", order_id)
                    .with_detail("attempt_id", attempt_id));
            }
        }

        self.apply_transition(&order_id, OrderTransition::AuthorizationSucceeded)?;
        let order = self.apply_transition(&order_id, OrderTransition::Complete)?;
        notify::dispatch_background(
            self.notifier.clone(),
            NotificationKind::OrderCompleted,
            &order,
        );
        Ok(Some(order))
    }

    /// Resolve an attempt that definitively failed
    ///
    /// Returns the failed order, or `None` when the attempt was already
    /// resolved by the other producer.
    pub async fn fail_attempt(
        &self,
        attempt_id: &str,
        status: AttemptStatus,
        transition: OrderTransition,
    ) -> AppResult<Option<Order>> {
        if !self.attempts.mark_if_pending(attempt_id, status) {
            return Ok(None);
        }
        let attempt = self.attempts.get(attempt_id).ok_or_else(|| {
            AppError::with_message(
                ErrorCode::UnknownAttempt,
                format!("attempt {attempt_id} not found"),
            )
        })?;
        let order_id = attempt.order_id.clone();

        let order = self.apply_transition(&order_id, transition)?;
        self.compensate(&order_id).await;
        notify::dispatch_background(self.notifier.clone(), NotificationKind::OrderFailed, &order);
        Ok(Some(order))
    }

    /// Resolve an attempt the provider reports cancelled
    pub async fn cancel_attempt(&self, attempt_id: &str) -> AppResult<Option<Order>> {
        if !self
            .attempts
            .mark_if_pending(attempt_id, AttemptStatus::Failed)
        {
            return Ok(None);
        }
        let attempt = self.attempts.get(attempt_id).ok_or_else(|| {
            AppError::with_message(
                ErrorCode::UnknownAttempt,
                format!("attempt {attempt_id} not found"),
            )
        })?;
        let order_id = attempt.order_id.clone();

        self.apply_transition(&order_id, OrderTransition::Cancel)?;
        self.compensate(&order_id).await;
        let order = self.apply_transition(&order_id, OrderTransition::CancellationConfirmed)?;
        notify::dispatch_background(
            self.notifier.clone(),
            NotificationKind::OrderCancelled,
            &order,
        );
        Ok(Some(order))
    }

    /// Best-effort void of an authorization that landed after its
    /// order already failed (late webhook after a timeout poll)
    pub fn spawn_refund(&self, attempt_id: &str) {
        let Some(attempt) = self.attempts.get(attempt_id) else {
            return;
        };
        let Some(external_ref) = attempt.external_ref.clone() else {
            return;
        };
        let this = self.clone();
        let attempt_id = attempt_id.to_string();
        let order_id = attempt.order_id.clone();
        tokio::spawn(async move {
            match this
                .with_retry(&attempt_id, || this.gateway.refund(&external_ref, None))
                .await
            {
                Ok(()) => {
                    this.attempts.mark(&attempt_id, AttemptStatus::Refunded);
                    tracing::info!(order_id, attempt_id, external_ref, "Late authorization refunded");
                }
                Err(e) => {
                    tracing::error!(
                        order_id,
                        attempt_id,
                        external_ref,
                        "Refund of late authorization failed, flagging for reconciliation: {e}"
                    );
                    let _ = this.orders.flag_reconciliation(&order_id);
                }
            }
        });
    }

    /// Apply a transition, absorbing a bounded number of version
    /// conflicts by reloading the order
    fn apply_transition(&self, order_id: &str, transition: OrderTransition) -> AppResult<Order> {
        const MAX_CONFLICT_RETRIES: u32 = 3;

        for _ in 0..MAX_CONFLICT_RETRIES {
            let current = self.orders.get(order_id).ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::OrderNotFound,
                    format!("order {order_id} not found"),
                )
            })?;
            match self.orders.transition(order_id, transition, current.version) {
                Ok((order, _event)) => return Ok(order),
                Err(e) if e.code == ErrorCode::VersionConflict => continue,
                Err(e) => return Err(e),
            }
        }
        Err(AppError::conflict(format!(
            "order {order_id} kept changing while applying {transition}"
        )))
    }

    /// Reverse the stock reservation; failure flags the order for
    /// manual reconciliation instead of blocking the terminal state
    async fn compensate(&self, order_id: &str) {
        if let Err(e) = self.inventory.release_stock(order_id).await {
            let prior_status = self
                .orders
                .get(order_id)
                .map(|o| o.status.to_string())
                .unwrap_or_default();
            tracing::error!(
                order_id,
                prior_status,
                "Stock release failed, order flagged for reconciliation: {e}"
            );
            let _ = self.orders.flag_reconciliation(order_id);
        }
    }

    /// Wait for the webhook window, then poll the provider and force a
    /// terminal resolution if the attempt is still pending
    fn spawn_resolution(&self, attempt_id: String) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.webhook_timeout).await;

            let Some(attempt) = this.attempts.get(&attempt_id) else {
                return;
            };
            if attempt.status.is_terminal() {
                return;
            }

            tracing::info!(
                attempt_id,
                order_id = %attempt.order_id,
                "No webhook within the resolution window, polling provider"
            );

            let polled = match attempt.external_ref.as_deref() {
                Some(external_ref) => {
                    this.with_retry(&attempt_id, || this.gateway.get_status(external_ref))
                        .await
                        .ok()
                }
                None => None,
            };

            let result = match polled.map(|o| o.status) {
                Some(AuthorizationStatus::Authorized) => {
                    this.finalize_authorized(&attempt_id).await
                }
                Some(AuthorizationStatus::Declined) => {
                    this.fail_attempt(
                        &attempt_id,
                        AttemptStatus::Declined,
                        OrderTransition::AuthorizationDeclined,
                    )
                    .await
                }
                // Still pending or unreachable: give up and unwind
                Some(AuthorizationStatus::Pending) | None => {
                    this.fail_attempt(
                        &attempt_id,
                        AttemptStatus::Failed,
                        OrderTransition::AuthorizationTimedOut,
                    )
                    .await
                }
            };

            if let Err(e) = result {
                tracing::error!(attempt_id, "Timeout resolution failed: {e}");
            }
        });
    }

    /// Retry `op` on transient gateway failures with exponential
    /// backoff; declines and invalid requests are never retried
    async fn with_retry<T, F, Fut>(&self, attempt_id: &str, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut retry = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        attempt_id,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider failure, backing off: {e}"
                    );
                    self.attempts.record_retry(attempt_id);
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reservation calls retry on transport failures with the same
    /// backoff schedule as gateway calls
    async fn reserve_stock_with_retry(
        &self,
        order_id: &str,
        items: &[LineItem],
    ) -> Result<ReserveOutcome, crate::inventory::InventoryError> {
        let mut retry = 0u32;
        loop {
            match self.inventory.reserve_stock(order_id, items).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if retry + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        order_id,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Inventory failure, backing off: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn notify_terminal(&self, order_id: &str, kind: NotificationKind) {
        if let Some(order) = self.orders.get(order_id) {
            notify::dispatch_background(self.notifier.clone(), kind, &order);
        }
    }
}

fn validate_items(items: &[LineItem]) -> AppResult<()> {
    for item in items {
        if item.quantity == 0 {
            return Err(
                AppError::validation(format!("item {} has zero quantity", item.product_id))
                    .with_detail("product_id", item.product_id.clone()),
            );
        }
        if item.unit_price.is_sign_negative() {
            return Err(
                AppError::validation(format!("item {} has negative price", item.product_id))
                    .with_detail("product_id", item.product_id.clone()),
            );
        }
    }
    Ok(())
}
