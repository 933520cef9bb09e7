//! Payment attempt records
//!
//! A `PaymentAttempt` tracks one authorization lifecycle against the
//! external payment provider. At most one attempt per order may be
//! non-terminal at any time, and the (order, idempotency key) pair is
//! unique so that retried requests resolve to the same attempt.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment attempt status, normalized from the provider's vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    /// Authorization requested, resolution pending (sync or webhook)
    Pending,
    /// Provider authorized the payment
    Authorized,
    /// Provider definitively declined the payment
    Declined,
    /// Attempt abandoned (timeout or retry budget exhausted)
    Failed,
    /// Authorization refunded after capture
    Refunded,
}

impl AttemptStatus {
    /// Terminal statuses are final and immutable
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Pending)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Pending => write!(f, "PENDING"),
            AttemptStatus::Authorized => write!(f, "AUTHORIZED"),
            AttemptStatus::Declined => write!(f, "DECLINED"),
            AttemptStatus::Failed => write!(f, "FAILED"),
            AttemptStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// One authorization lifecycle against the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// Attempt unique ID
    pub attempt_id: String,
    /// Owning order
    pub order_id: String,
    /// Idempotency key forwarded to the provider; retries reuse it so
    /// the provider deduplicates as well
    pub idempotency_key: String,
    /// Requested amount
    pub amount: Decimal,
    /// Currency code (ISO 4217)
    pub currency: String,
    /// Provider-side authorization reference, assigned on first response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    /// Current status
    pub status: AttemptStatus,
    /// Transient-failure retries performed for this attempt
    pub retry_count: u32,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl PaymentAttempt {
    pub fn new(
        order_id: String,
        idempotency_key: String,
        amount: Decimal,
        currency: String,
    ) -> Self {
        let now = crate::util::now_millis();
        Self {
            attempt_id: uuid::Uuid::new_v4().to_string(),
            order_id,
            idempotency_key,
            amount,
            currency,
            external_ref: None,
            status: AttemptStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
