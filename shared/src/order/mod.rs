//! Shared order domain types
//!
//! - **types**: order, line items, address snapshots, lifecycle status
//! - **event**: state-machine transitions and emitted domain events

pub mod event;
pub mod types;

pub use event::{OrderEvent, OrderTransition};
pub use types::{Address, LineItem, Order, OrderStatus};
