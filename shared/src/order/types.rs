//! Core order types shared between the orchestrator and its clients

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// Terminal statuses are final: no further transition is accepted once
/// an order reaches `COMPLETED`, `CANCELLED`, or `FAILED`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Reserved,
    Authorizing,
    Authorized,
    Completed,
    Cancelling,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// Whether this status is terminal (no further transitions accepted)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Created => write!(f, "CREATED"),
            OrderStatus::Reserved => write!(f, "RESERVED"),
            OrderStatus::Authorizing => write!(f, "AUTHORIZING"),
            OrderStatus::Authorized => write!(f, "AUTHORIZED"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
            OrderStatus::Cancelling => write!(f, "CANCELLING"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Ordered line item with unit-price snapshot
///
/// The price is snapshotted at checkout time; later catalog changes
/// never affect an existing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Product reference
    pub product_id: String,
    /// Product name snapshot
    pub name: String,
    /// Quantity ordered
    pub quantity: u32,
    /// Unit price snapshot
    pub unit_price: Decimal,
}

impl LineItem {
    /// Line total (unit price x quantity)
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Address snapshot (shipping or billing)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Address {
    /// Full recipient name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A customer order
///
/// Mutated exclusively by the order state machine; `version` increments
/// on every persisted mutation and is used to detect lost updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Caller-visible order identifier
    pub order_id: String,
    /// Owner (customer) identifier
    pub customer_id: String,
    /// Ordered line items with price snapshots
    pub items: Vec<LineItem>,
    /// Computed total, immutable once status leaves CREATED
    pub total: Decimal,
    /// Currency code (ISO 4217)
    pub currency: String,
    /// Shipping address snapshot
    pub shipping_address: Address,
    /// Billing address snapshot
    pub billing_address: Address,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Optimistic concurrency version
    pub version: u64,
    /// Set when stock release failed after a terminal failure and the
    /// order is flagged for manual reconciliation
    #[serde(default)]
    pub needs_reconciliation: bool,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Last mutation timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Order {
    /// Create a new order in `CREATED` with a computed total
    pub fn new(
        customer_id: String,
        items: Vec<LineItem>,
        currency: String,
        shipping_address: Address,
        billing_address: Address,
    ) -> Self {
        let total = items.iter().map(LineItem::line_total).sum();
        let now = crate::util::now_millis();
        Self {
            order_id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            items,
            total,
            currency,
            shipping_address,
            billing_address,
            status: OrderStatus::Created,
            version: 0,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
        }
    }
}
