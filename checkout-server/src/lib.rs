//! Checkout Server - order-payment consistency orchestrator
//!
//! Drives a customer order through creation, stock reservation,
//! payment authorization, confirmation or compensation, and
//! notification dispatch across independently failing collaborators,
//! without double-charging or leaving an order stuck.
//!
//! # Module structure
//!
//! ```text
//! checkout-server/src/
//! ├── core/          # Configuration, state, server, background tasks
//! ├── orders/        # State machine and version-checked order store
//! ├── orchestrator/  # Saga driver: retries, compensation, receipts
//! ├── ledger/        # Idempotency ledger (reserve/commit protocol)
//! ├── payment/       # Provider gateway and attempt registry
//! ├── inventory/     # Stock reservation collaborator client
//! ├── notify/        # Fire-and-forget customer notifications
//! ├── webhook/       # Signed provider callbacks, at-most-once apply
//! └── api/           # HTTP routes and middleware
//! ```

pub mod api;
pub mod core;
pub mod inventory;
pub mod ledger;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod orders;
pub mod payment;
pub mod webhook;

// Re-export common types
pub use core::{Config, Server, ServerState};
pub use ledger::{IdempotencyLedger, Reservation};
pub use orchestrator::{Orchestrator, PlaceOrderReceipt, PlaceOrderRequest};
pub use orders::OrderStore;
pub use payment::AttemptStore;
pub use webhook::WebhookIngress;

// Re-export unified error types from shared
pub use shared::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use logging::init_logger;

/// Load `.env` and initialize logging per the runtime environment
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let production = std::env::var("ENVIRONMENT").as_deref() == Ok("production");
    init_logger("info", production);
}
