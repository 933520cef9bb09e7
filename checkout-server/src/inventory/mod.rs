//! Inventory service client
//!
//! Stock is reserved before payment authorization starts and released
//! whenever the saga unwinds. Release is the compensation step; a
//! release failure is surfaced to the orchestrator, which flags the
//! order for manual reconciliation.

use async_trait::async_trait;
use serde::Serialize;
use shared::order::LineItem;
use std::time::Duration;

/// Result of a reservation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock held for the order
    Ok,
    /// One or more lines cannot be covered
    Insufficient { detail: String },
}

#[derive(Debug, thiserror::Error)]
#[error("inventory service error: {0}")]
pub struct InventoryError(pub String);

#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Hold stock for every line of the order
    async fn reserve_stock(
        &self,
        order_id: &str,
        items: &[LineItem],
    ) -> Result<ReserveOutcome, InventoryError>;

    /// Return previously held stock (compensation)
    async fn release_stock(&self, order_id: &str) -> Result<(), InventoryError>;
}

pub struct HttpInventoryClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ReservationBody<'a> {
    order_id: &'a str,
    items: &'a [LineItem],
}

impl HttpInventoryClient {
    pub fn new(base_url: String, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn reserve_stock(
        &self,
        order_id: &str,
        items: &[LineItem],
    ) -> Result<ReserveOutcome, InventoryError> {
        let response = self
            .client
            .post(format!("{}/reservations", self.base_url))
            .json(&ReservationBody { order_id, items })
            .send()
            .await
            .map_err(|e| InventoryError(format!("reserve request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(ReserveOutcome::Ok);
        }
        // 409 is the service's out-of-stock answer, a definitive outcome
        if status == reqwest::StatusCode::CONFLICT {
            let detail = response.text().await.unwrap_or_default();
            return Ok(ReserveOutcome::Insufficient { detail });
        }
        let text = response.text().await.unwrap_or_default();
        Err(InventoryError(format!("reserve failed with {status}: {text}")))
    }

    async fn release_stock(&self, order_id: &str) -> Result<(), InventoryError> {
        let response = self
            .client
            .delete(format!("{}/reservations/{order_id}", self.base_url))
            .send()
            .await
            .map_err(|e| InventoryError(format!("release request failed: {e}")))?;

        let status = response.status();
        // A missing reservation means there is nothing to unwind
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(InventoryError(format!("release failed with {status}: {text}")))
    }
}
