//! Payment provider client
//!
//! The gateway trait is the seam between the orchestrator and the
//! external payment provider; the HTTP implementation talks to the
//! provider's REST API, tests plug in programmable fakes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Provider-side status of an authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationStatus {
    Authorized,
    Declined,
    Pending,
}

/// Result of a create/confirm/status call against the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationOutcome {
    /// Provider-assigned reference for the authorization
    pub external_ref: String,
    pub status: AuthorizationStatus,
    /// Provider-supplied reason, set on declines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Authorization request forwarded to the provider
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub amount: Decimal,
    pub currency: String,
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Gateway failure classification
///
/// Transient failures are retryable (timeouts, connection errors, 5xx,
/// throttling); invalid failures are not and abort the attempt.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment provider unavailable: {0}")]
    Transient(String),
    #[error("payment request rejected: {0}")]
    Invalid(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open an authorization hold for the given amount
    async fn create_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, GatewayError>;

    /// Capture a previously authorized hold
    async fn confirm_authorization(
        &self,
        external_ref: &str,
    ) -> Result<AuthorizationOutcome, GatewayError>;

    /// Poll the provider for the current status of an authorization
    async fn get_status(&self, external_ref: &str) -> Result<AuthorizationOutcome, GatewayError>;

    /// Best-effort refund of an authorization
    ///
    /// `amount` of `None` voids the full hold; `Some` refunds that
    /// partial amount.
    async fn refund(&self, external_ref: &str, amount: Option<Decimal>)
    -> Result<(), GatewayError>;
}

/// Gateway implementation over the provider's REST API
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

/// Body for a partial refund; omitted entirely for a full void
#[derive(Debug, Serialize)]
struct RefundRequest {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct ProviderAuthorization {
    id: String,
    status: AuthorizationStatus,
    #[serde(default)]
    reason: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn parse_outcome(
        response: reqwest::Response,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        let status = response.status();

        if status.is_success() {
            let body: ProviderAuthorization = response
                .json()
                .await
                .map_err(|e| GatewayError::Transient(format!("malformed provider response: {e}")))?;
            return Ok(AuthorizationOutcome {
                external_ref: body.id,
                status: body.status,
                reason: body.reason,
            });
        }

        // 402 is the provider's decline signal, a definitive outcome
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            let body: ProviderAuthorization = response
                .json()
                .await
                .map_err(|e| GatewayError::Transient(format!("malformed provider response: {e}")))?;
            return Ok(AuthorizationOutcome {
                external_ref: body.id,
                status: AuthorizationStatus::Declined,
                reason: body.reason,
            });
        }

        let text = response.text().await.unwrap_or_default();
        if Self::is_retryable_status(status) {
            Err(GatewayError::Transient(format!("provider {status}: {text}")))
        } else {
            Err(GatewayError::Invalid(format!("provider {status}: {text}")))
        }
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        status.is_server_error()
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
    }

    fn map_transport(e: reqwest::Error) -> GatewayError {
        // Network level failures have no definitive outcome, retry
        GatewayError::Transient(format!("provider request failed: {e}"))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        let response = self
            .client
            .post(format!("{}/authorizations", self.base_url))
            .header("Idempotency-Key", &request.idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::parse_outcome(response).await
    }

    async fn confirm_authorization(
        &self,
        external_ref: &str,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        let response = self
            .client
            .post(format!("{}/authorizations/{external_ref}/confirm", self.base_url))
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::parse_outcome(response).await
    }

    async fn get_status(&self, external_ref: &str) -> Result<AuthorizationOutcome, GatewayError> {
        let response = self
            .client
            .get(format!("{}/authorizations/{external_ref}", self.base_url))
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::parse_outcome(response).await
    }

    async fn refund(
        &self,
        external_ref: &str,
        amount: Option<Decimal>,
    ) -> Result<(), GatewayError> {
        let mut request = self
            .client
            .post(format!("{}/authorizations/{external_ref}/refund", self.base_url));
        if let Some(amount) = amount {
            request = request.json(&RefundRequest { amount });
        }
        let response = request.send().await.map_err(Self::map_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        if Self::is_retryable_status(status) {
            Err(GatewayError::Transient(format!("provider {status}: {text}")))
        } else {
            Err(GatewayError::Invalid(format!("provider {status}: {text}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::Transient("503".into()).is_transient());
        assert!(!GatewayError::Invalid("422".into()).is_transient());
    }

    #[test]
    fn test_retryable_status_codes() {
        use reqwest::StatusCode;
        assert!(HttpPaymentGateway::is_retryable_status(
            StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(HttpPaymentGateway::is_retryable_status(
            StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(HttpPaymentGateway::is_retryable_status(
            StatusCode::REQUEST_TIMEOUT
        ));
        assert!(HttpPaymentGateway::is_retryable_status(
            StatusCode::TOO_MANY_REQUESTS
        ));
        assert!(!HttpPaymentGateway::is_retryable_status(
            StatusCode::UNPROCESSABLE_ENTITY
        ));
        assert!(!HttpPaymentGateway::is_retryable_status(
            StatusCode::PAYMENT_REQUIRED
        ));
    }

    #[test]
    fn test_partial_refund_body() {
        let body = serde_json::to_value(RefundRequest {
            amount: rust_decimal_macros::dec!(25.50),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "amount": "25.50" }));
    }

    #[test]
    fn test_authorization_status_wire_format() {
        let s: AuthorizationStatus = serde_json::from_str("\"AUTHORIZED\"").unwrap();
        assert_eq!(s, AuthorizationStatus::Authorized);
        assert_eq!(
            serde_json::to_string(&AuthorizationStatus::Pending).unwrap(),
            "\"PENDING\""
        );
    }
}
