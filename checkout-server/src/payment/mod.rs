//! Payment authorization
//!
//! - **gateway**: client for the external payment provider
//! - **attempts**: attempt registry and race arbitration

pub mod attempts;
pub mod gateway;

pub use attempts::AttemptStore;
pub use gateway::{
    AuthorizationOutcome, AuthorizationRequest, AuthorizationStatus, GatewayError,
    HttpPaymentGateway, PaymentGateway,
};

pub use shared::payment::{AttemptStatus, PaymentAttempt};
