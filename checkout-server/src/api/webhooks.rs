//! Payment Webhook Routes
//!
//! The provider retries delivery on any non-2xx, so every recognized
//! request is acknowledged with 200 even when it maps to nothing on
//! our side. Only a bad signature or an unparseable body is rejected.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};

use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};

use crate::core::ServerState;
use crate::webhook::{self, Disposition};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Build webhook router
pub fn router() -> Router<ServerState> {
    Router::new().route("/webhooks/payment", post(payment_webhook))
}

/// Ingest one signed provider event
pub async fn payment_webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<Disposition>>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::InvalidWebhookSignature,
                "missing webhook signature header",
            )
        })?;

    let disposition = webhook::ingest(
        state.ingress(),
        &state.config().webhook_secret,
        signature,
        &body,
    )
    .await?;
    Ok(Json(ApiResponse::success(disposition)))
}
