//! Order state machine transition table
//!
//! The table is exhaustive and explicit: every legal (status,
//! transition) pair is listed, everything else is rejected. Terminal
//! statuses have no outgoing edges.
//!
//! ```text
//! CREATED ──Reserve──────────────────▶ RESERVED
//! CREATED ──ReservationRejected─────▶ FAILED
//! RESERVED ──StartAuthorization─────▶ AUTHORIZING
//! AUTHORIZING ──AuthorizationSucceeded──▶ AUTHORIZED
//! AUTHORIZED ──Complete─────────────▶ COMPLETED
//! RESERVED|AUTHORIZING ──Cancel─────▶ CANCELLING
//! CANCELLING ──CancellationConfirmed▶ CANCELLED
//! AUTHORIZING ──AuthorizationDeclined──▶ FAILED
//! AUTHORIZING ──AuthorizationTimedOut──▶ FAILED
//! ```

use shared::order::{OrderStatus, OrderTransition};

/// Resolve the next status for a (status, transition) pair
///
/// Returns `None` for any pair not in the table; callers surface that
/// as an illegal transition.
pub fn next_status(current: OrderStatus, transition: OrderTransition) -> Option<OrderStatus> {
    use OrderStatus::*;
    use OrderTransition::*;

    match (current, transition) {
        (Created, Reserve) => Some(Reserved),
        (Created, ReservationRejected) => Some(Failed),
        (Reserved, StartAuthorization) => Some(Authorizing),
        (Authorizing, AuthorizationSucceeded) => Some(Authorized),
        (Authorized, Complete) => Some(Completed),
        (Reserved, Cancel) => Some(Cancelling),
        (Authorizing, Cancel) => Some(Cancelling),
        (Cancelling, CancellationConfirmed) => Some(Cancelled),
        (Authorizing, AuthorizationDeclined) => Some(Failed),
        (Authorizing, AuthorizationTimedOut) => Some(Failed),
        _ => None,
    }
}
