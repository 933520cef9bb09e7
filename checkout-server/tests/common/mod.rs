//! Shared test fixtures: programmable collaborator fakes
//!
//! Each fake records its calls and pops scripted outcomes from a
//! queue, so tests can drive the saga through success, decline,
//! pending and transient-failure paths without real services.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use checkout_server::core::{Config, ServerState};
use checkout_server::inventory::{InventoryClient, InventoryError, ReserveOutcome};
use checkout_server::notify::{NotificationDispatcher, NotificationKind, NotifyError};
use checkout_server::payment::{
    AuthorizationOutcome, AuthorizationRequest, AuthorizationStatus, GatewayError, PaymentGateway,
};
use checkout_server::orchestrator::PlaceOrderRequest;
use rust_decimal_macros::dec;
use shared::order::{Address, LineItem};

/// Scripted gateway response
#[derive(Debug, Clone)]
pub enum MockAuth {
    Outcome(AuthorizationStatus, &'static str),
    Transient,
    Invalid,
}

#[derive(Default)]
pub struct MockGateway {
    pub create_script: Mutex<VecDeque<MockAuth>>,
    pub status_script: Mutex<VecDeque<MockAuth>>,
    pub create_calls: AtomicU32,
    pub confirm_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub refund_calls: AtomicU32,
}

impl MockGateway {
    pub fn scripted(script: Vec<MockAuth>) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.create_script.lock() = script.into();
        Arc::new(gateway)
    }

    fn resolve(step: Option<MockAuth>) -> Result<AuthorizationOutcome, GatewayError> {
        match step.unwrap_or(MockAuth::Outcome(AuthorizationStatus::Authorized, "auth_default")) {
            MockAuth::Outcome(status, external_ref) => Ok(AuthorizationOutcome {
                external_ref: external_ref.to_string(),
                status,
                reason: match status {
                    AuthorizationStatus::Declined => Some("card declined".to_string()),
                    _ => None,
                },
            }),
            MockAuth::Transient => Err(GatewayError::Transient("scripted 503".to_string())),
            MockAuth::Invalid => Err(GatewayError::Invalid("scripted 422".to_string())),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_authorization(
        &self,
        _request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::resolve(self.create_script.lock().pop_front())
    }

    async fn confirm_authorization(
        &self,
        external_ref: &str,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AuthorizationOutcome {
            external_ref: external_ref.to_string(),
            status: AuthorizationStatus::Authorized,
            reason: None,
        })
    }

    async fn get_status(&self, external_ref: &str) -> Result<AuthorizationOutcome, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.status_script.lock().pop_front();
        match step {
            Some(step) => Self::resolve(Some(step)),
            None => Ok(AuthorizationOutcome {
                external_ref: external_ref.to_string(),
                status: AuthorizationStatus::Pending,
                reason: None,
            }),
        }
    }

    async fn refund(
        &self,
        _external_ref: &str,
        _amount: Option<rust_decimal::Decimal>,
    ) -> Result<(), GatewayError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted inventory response
#[derive(Debug, Clone)]
pub enum MockReserve {
    Ok,
    Insufficient,
    Error,
}

#[derive(Default)]
pub struct MockInventory {
    pub reserve_script: Mutex<VecDeque<MockReserve>>,
    pub reserve_calls: AtomicU32,
    pub release_calls: AtomicU32,
    pub fail_release: std::sync::atomic::AtomicBool,
}

impl MockInventory {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(script: Vec<MockReserve>) -> Arc<Self> {
        let inventory = Self::default();
        *inventory.reserve_script.lock() = script.into();
        Arc::new(inventory)
    }
}

#[async_trait]
impl InventoryClient for MockInventory {
    async fn reserve_stock(
        &self,
        _order_id: &str,
        _items: &[LineItem],
    ) -> Result<ReserveOutcome, InventoryError> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        match self.reserve_script.lock().pop_front().unwrap_or(MockReserve::Ok) {
            MockReserve::Ok => Ok(ReserveOutcome::Ok),
            MockReserve::Insufficient => Ok(ReserveOutcome::Insufficient {
                detail: "scripted shortage".to_string(),
            }),
            MockReserve::Error => Err(InventoryError("scripted outage".to_string())),
        }
    }

    async fn release_stock(&self, _order_id: &str) -> Result<(), InventoryError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            Err(InventoryError("scripted release failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<(NotificationKind, String, String)>>,
}

impl MockNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl NotificationDispatcher for MockNotifier {
    async fn dispatch(
        &self,
        kind: NotificationKind,
        order_id: &str,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .push((kind, order_id.to_string(), recipient.to_string()));
        Ok(())
    }
}

/// Configuration with timings shrunk for tests
pub fn test_config() -> Config {
    let mut config = Config::from_env();
    config.webhook_timeout_ms = 100;
    config.payment_retry_max_attempts = 3;
    config.payment_retry_base_delay_ms = 1;
    config.ledger_wait_ms = 200;
    config
}

pub fn test_state(
    gateway: Arc<MockGateway>,
    inventory: Arc<MockInventory>,
    notifier: Arc<MockNotifier>,
) -> ServerState {
    ServerState::with_collaborators(&test_config(), gateway, inventory, notifier)
}

pub fn sample_address() -> Address {
    Address {
        first_name: "Ana".to_string(),
        last_name: "Lopez".to_string(),
        street: "1 Main St".to_string(),
        street2: None,
        city: "Madrid".to_string(),
        state: "MD".to_string(),
        zip_code: "28001".to_string(),
        country: "ES".to_string(),
        phone: None,
        email: Some("ana@example.com".to_string()),
    }
}

pub fn sample_request() -> PlaceOrderRequest {
    PlaceOrderRequest {
        customer_id: "cust-1".to_string(),
        items: vec![LineItem {
            product_id: "prod-1".to_string(),
            name: "4K Monitor".to_string(),
            quantity: 1,
            unit_price: dec!(999.99),
        }],
        currency: "EUR".to_string(),
        shipping_address: sample_address(),
        billing_address: sample_address(),
    }
}
