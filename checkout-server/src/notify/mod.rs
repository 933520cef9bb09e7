//! Customer notifications
//!
//! Dispatch is fire-and-forget: a notification failure never changes
//! order state and never fails the saga, it is logged and dropped.

use async_trait::async_trait;
use serde::Serialize;
use shared::order::Order;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    OrderCompleted,
    OrderFailed,
    OrderCancelled,
}

#[derive(Debug, thiserror::Error)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        kind: NotificationKind,
        order_id: &str,
        recipient: &str,
    ) -> Result<(), NotifyError>;
}

pub struct HttpNotificationDispatcher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct NotificationBody<'a> {
    kind: NotificationKind,
    order_id: &'a str,
    recipient: &'a str,
}

impl HttpNotificationDispatcher {
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
impl NotificationDispatcher for HttpNotificationDispatcher {
    async fn dispatch(
        &self,
        kind: NotificationKind,
        order_id: &str,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/notifications", self.base_url))
            .json(&NotificationBody {
                kind,
                order_id,
                recipient,
            })
            .send()
            .await
            .map_err(|e| NotifyError(format!("send failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(NotifyError(format!("service answered {status}: {text}")))
    }
}

/// Notification recipient for an order: shipping email when present,
/// otherwise the customer id for downstream resolution
pub fn recipient(order: &Order) -> String {
    order
        .shipping_address
        .email
        .clone()
        .unwrap_or_else(|| order.customer_id.clone())
}

/// Send a notification without blocking or failing the caller
pub fn dispatch_background(
    dispatcher: Arc<dyn NotificationDispatcher>,
    kind: NotificationKind,
    order: &Order,
) {
    let order_id = order.order_id.clone();
    let to = recipient(order);
    tokio::spawn(async move {
        if let Err(e) = dispatcher.dispatch(kind, &order_id, &to).await {
            tracing::warn!(order_id, kind = ?kind, "Notification dropped: {e}");
        }
    });
}
