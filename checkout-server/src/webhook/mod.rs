//! Payment webhook ingress
//!
//! The payment provider redelivers events until it sees a 2xx, so the
//! handler must tolerate the same event arriving any number of times
//! and in any order relative to the orchestrator's own timeout poll.
//! Each distinct `event_id` is applied at most once, via the same
//! idempotency ledger that guards checkout requests.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use shared::error::{AppError, AppResult};
use shared::order::OrderTransition;
use shared::payment::AttemptStatus;

use crate::ledger::Reservation;
use crate::orchestrator::Orchestrator;

mod signature;

pub use signature::{sign_payload, verify_signature};

/// Event types emitted by the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "payment.authorized")]
    PaymentAuthorized,
    #[serde(rename = "payment.declined")]
    PaymentDeclined,
    #[serde(rename = "payment.canceled")]
    PaymentCanceled,
    #[serde(other)]
    Unknown,
}

/// Decoded webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: WebhookEventType,
    /// Provider reference of the authorization the event is about
    pub external_ref: String,
    #[serde(default)]
    pub data: Value,
}

/// What the ingress did with an event; always acknowledged with 2xx so
/// the provider stops redelivering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Event drove a state transition
    Applied,
    /// Same event id seen before, nothing done
    Replay,
    /// No attempt matches the provider reference
    UnknownAttempt,
    /// Attempt already terminal, event arrived too late
    AlreadyResolved,
    /// Event type we do not consume
    Ignored,
}

/// Maps provider callbacks onto the order state machine
#[derive(Clone)]
pub struct WebhookIngress {
    orchestrator: Orchestrator,
}

impl WebhookIngress {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Apply one provider event at most once
    pub async fn handle_event(&self, event: WebhookEvent) -> AppResult<Disposition> {
        let scoped = format!("webhook:{}", event.event_id);
        let permit = match self.orchestrator.ledger().reserve(&scoped).await? {
            Reservation::Completed(_) => {
                tracing::info!(event_id = %event.event_id, "Webhook replay ignored");
                return Ok(Disposition::Replay);
            }
            Reservation::Fresh(permit) => permit,
        };

        let disposition = self.apply(&event).await?;
        permit.commit(json!(disposition));
        Ok(disposition)
    }

    async fn apply(&self, event: &WebhookEvent) -> AppResult<Disposition> {
        if event.event_type == WebhookEventType::Unknown {
            tracing::info!(
                event_id = %event.event_id,
                external_ref = %event.external_ref,
                "Unhandled webhook event type acknowledged"
            );
            return Ok(Disposition::Ignored);
        }

        let Some(attempt) = self
            .orchestrator
            .attempts()
            .find_by_external_ref(&event.external_ref)
        else {
            // Acknowledge so the provider stops redelivering; nothing
            // of ours matches this reference
            tracing::warn!(
                event_id = %event.event_id,
                external_ref = %event.external_ref,
                "Webhook for unknown attempt dropped"
            );
            return Ok(Disposition::UnknownAttempt);
        };

        if attempt.status.is_terminal() {
            // Never reopen a resolved attempt. A late authorization for
            // an attempt we already failed means money is held with no
            // live order behind it; void it.
            if event.event_type == WebhookEventType::PaymentAuthorized
                && attempt.status == AttemptStatus::Failed
            {
                tracing::warn!(
                    event_id = %event.event_id,
                    attempt_id = %attempt.attempt_id,
                    "Authorization arrived after timeout resolution, refunding"
                );
                self.orchestrator.spawn_refund(&attempt.attempt_id);
            }
            return Ok(Disposition::AlreadyResolved);
        }

        let resolved = match event.event_type {
            WebhookEventType::PaymentAuthorized => {
                self.orchestrator
                    .finalize_authorized(&attempt.attempt_id)
                    .await?
            }
            WebhookEventType::PaymentDeclined => {
                self.orchestrator
                    .fail_attempt(
                        &attempt.attempt_id,
                        AttemptStatus::Declined,
                        OrderTransition::AuthorizationDeclined,
                    )
                    .await?
            }
            WebhookEventType::PaymentCanceled => {
                self.orchestrator.cancel_attempt(&attempt.attempt_id).await?
            }
            WebhookEventType::Unknown => None,
        };

        match resolved {
            Some(order) => {
                tracing::info!(
                    event_id = %event.event_id,
                    order_id = %order.order_id,
                    status = %order.status,
                    "Webhook applied"
                );
                Ok(Disposition::Applied)
            }
            // The poller won the race between our terminal check and
            // the attempt update
            None => Ok(Disposition::AlreadyResolved),
        }
    }
}

/// Decode and dispatch a raw webhook body
pub async fn ingest(
    ingress: &WebhookIngress,
    secret: &str,
    signature: &str,
    body: &[u8],
) -> AppResult<Disposition> {
    if !verify_signature(secret, body, signature) {
        return Err(AppError::with_message(
            shared::ErrorCode::InvalidWebhookSignature,
            "webhook signature verification failed",
        ));
    }
    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("malformed webhook payload: {e}")))?;
    ingress.handle_event(event).await
}
