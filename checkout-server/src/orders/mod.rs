//! Order state machine
//!
//! - **machine**: the closed transition table
//! - **store**: version-checked order persistence
//!
//! The store is the only writer of order records; the orchestrator and
//! webhook ingress both converge on it and serialize per-order updates
//! through the optimistic version check.

pub mod machine;
pub mod store;

pub use store::OrderStore;

// Re-export shared types for convenience
pub use shared::order::{Order, OrderEvent, OrderStatus, OrderTransition};
