//! Unified error codes for the checkout orchestrator
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order / state machine errors
//! - 5xxx: Payment errors
//! - 6xxx: Inventory errors
//! - 7xxx: Idempotency errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Codes are represented as u16 values for efficient serialization and
/// stable wire compatibility with API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,
    /// Missing or malformed idempotency key
    IdempotencyKeyRequired = 9,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order version mismatch (lost-update protection)
    VersionConflict = 4002,
    /// Transition not permitted from the current order status
    IllegalTransition = 4003,
    /// Order is already in a terminal status
    OrderTerminal = 4004,
    /// Order has no line items
    OrderEmpty = 4005,

    // ==================== 5xxx: Payment ====================
    /// Payment authorization was declined by the provider
    PaymentDeclined = 5001,
    /// Payment provider unreachable or returned a server error
    PaymentProviderUnavailable = 5002,
    /// Another payment attempt is already in flight for this order
    AttemptInFlight = 5003,
    /// Webhook references an unknown payment attempt
    UnknownAttempt = 5004,
    /// Webhook signature verification failed
    InvalidWebhookSignature = 5005,

    // ==================== 6xxx: Inventory ====================
    /// Not enough stock to reserve the requested quantities
    InsufficientStock = 6001,
    /// Stock release after a failed order did not succeed
    CompensationFailed = 6002,

    // ==================== 7xxx: Idempotency ====================
    /// A request with the same idempotency key is currently executing
    ConcurrentRequest = 7001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

/// Error category classification based on error code ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Order / state machine errors (4xxx)
    Order,
    /// Payment errors (5xxx)
    Payment,
    /// Inventory errors (6xxx)
    Inventory,
    /// Idempotency errors (7xxx)
    Idempotency,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            4000..5000 => Self::Order,
            5000..6000 => Self::Payment,
            6000..7000 => Self::Inventory,
            7000..8000 => Self::Idempotency,
            _ => Self::System,
        }
    }
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the error category for this code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::IdempotencyKeyRequired => "Idempotency-Key header is required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::VersionConflict => "Order was modified concurrently, reload and retry",
            ErrorCode::IllegalTransition => "Transition not permitted from current order status",
            ErrorCode::OrderTerminal => "Order is already in a terminal status",
            ErrorCode::OrderEmpty => "Order has no line items",

            // Payment
            ErrorCode::PaymentDeclined => "Payment was declined",
            ErrorCode::PaymentProviderUnavailable => "Payment provider is unavailable",
            ErrorCode::AttemptInFlight => "A payment attempt is already in flight",
            ErrorCode::UnknownAttempt => "Unknown payment attempt",
            ErrorCode::InvalidWebhookSignature => "Webhook signature verification failed",

            // Inventory
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::CompensationFailed => "Stock release failed, flagged for reconciliation",

            // Idempotency
            ErrorCode::ConcurrentRequest => {
                "A request with the same idempotency key is in progress"
            }

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            ErrorCode::Success => StatusCode::OK,
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidRequest
            | ErrorCode::OrderEmpty
            | ErrorCode::IdempotencyKeyRequired => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound | ErrorCode::OrderNotFound | ErrorCode::UnknownAttempt => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::VersionConflict
            | ErrorCode::OrderTerminal
            | ErrorCode::AttemptInFlight
            | ErrorCode::ConcurrentRequest
            | ErrorCode::InsufficientStock => StatusCode::CONFLICT,
            ErrorCode::PaymentDeclined => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::PaymentProviderUnavailable | ErrorCode::NetworkError => {
                StatusCode::BAD_GATEWAY
            }
            ErrorCode::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
            ErrorCode::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::Unknown
            | ErrorCode::IllegalTransition
            | ErrorCode::CompensationFailed
            | ErrorCode::InternalError
            | ErrorCode::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.code(), self.message())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),
            9 => Ok(ErrorCode::IdempotencyKeyRequired),

            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::VersionConflict),
            4003 => Ok(ErrorCode::IllegalTransition),
            4004 => Ok(ErrorCode::OrderTerminal),
            4005 => Ok(ErrorCode::OrderEmpty),

            5001 => Ok(ErrorCode::PaymentDeclined),
            5002 => Ok(ErrorCode::PaymentProviderUnavailable),
            5003 => Ok(ErrorCode::AttemptInFlight),
            5004 => Ok(ErrorCode::UnknownAttempt),
            5005 => Ok(ErrorCode::InvalidWebhookSignature),

            6001 => Ok(ErrorCode::InsufficientStock),
            6002 => Ok(ErrorCode::CompensationFailed),

            7001 => Ok(ErrorCode::ConcurrentRequest),

            9001 => Ok(ErrorCode::InternalError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            other => Err(InvalidErrorCode(other)),
        }
    }
}
