//! Shared types for the checkout orchestrator
//!
//! Domain vocabulary used by the server and its tests: order and
//! payment-attempt models, the unified error system, and small
//! utilities.

pub mod error;
pub mod order;
pub mod payment;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use order::{Address, LineItem, Order, OrderEvent, OrderStatus, OrderTransition};
pub use payment::{AttemptStatus, PaymentAttempt};
