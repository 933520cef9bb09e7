//! Order transitions and the domain events they emit

use super::types::OrderStatus;
use serde::{Deserialize, Serialize};

/// Transition event applied to the order state machine
///
/// The transition table in the orchestrator is exhaustive over
/// (status, transition) pairs; anything not listed there is rejected
/// as an illegal transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderTransition {
    /// Stock reserved for the order
    Reserve,
    /// Stock reservation rejected (insufficient stock)
    ReservationRejected,
    /// Payment authorization dispatched to the provider
    StartAuthorization,
    /// Provider authorized the payment
    AuthorizationSucceeded,
    /// Provider definitively declined the payment
    AuthorizationDeclined,
    /// No resolution within the webhook window and the status poll
    AuthorizationTimedOut,
    /// Authorization captured, order fulfilled
    Complete,
    /// Cancellation requested before a terminal state
    Cancel,
    /// Compensation done, cancellation final
    CancellationConfirmed,
}

impl std::fmt::Display for OrderTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderTransition::Reserve => write!(f, "RESERVE"),
            OrderTransition::ReservationRejected => write!(f, "RESERVATION_REJECTED"),
            OrderTransition::StartAuthorization => write!(f, "START_AUTHORIZATION"),
            OrderTransition::AuthorizationSucceeded => write!(f, "AUTHORIZATION_SUCCEEDED"),
            OrderTransition::AuthorizationDeclined => write!(f, "AUTHORIZATION_DECLINED"),
            OrderTransition::AuthorizationTimedOut => write!(f, "AUTHORIZATION_TIMED_OUT"),
            OrderTransition::Complete => write!(f, "COMPLETE"),
            OrderTransition::Cancel => write!(f, "CANCEL"),
            OrderTransition::CancellationConfirmed => write!(f, "CANCELLATION_CONFIRMED"),
        }
    }
}

/// Domain event emitted by a successful state-machine transition
///
/// Immutable audit record; consumed by the notification path and kept
/// for operator visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Event unique ID
    pub event_id: String,
    /// Order this event belongs to
    pub order_id: String,
    /// Status before the transition
    pub from_status: OrderStatus,
    /// Status after the transition
    pub to_status: OrderStatus,
    /// Transition that was applied
    pub transition: OrderTransition,
    /// Order version after the transition
    pub version: u64,
    /// Server timestamp (Unix milliseconds)
    pub timestamp: i64,
}

impl OrderEvent {
    pub fn new(
        order_id: String,
        from_status: OrderStatus,
        to_status: OrderStatus,
        transition: OrderTransition,
        version: u64,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            order_id,
            from_status,
            to_status,
            transition,
            version,
            timestamp: crate::util::now_millis(),
        }
    }
}
