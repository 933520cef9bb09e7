//! Checkout Routes
//!
//! `POST /orders` accepts a cart and an `Idempotency-Key` header and
//! returns a stable receipt; replays with the same key return the same
//! receipt. `GET /orders/{id}` returns the current order snapshot.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};
use shared::order::Order;

use crate::core::ServerState;
use crate::orchestrator::{PlaceOrderReceipt, PlaceOrderRequest};

/// Build checkout router
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/orders", post(place_order))
        .route("/orders/{order_id}", get(order_status))
}

/// Accept a checkout request
///
/// The saga keeps running server-side even if the client disconnects
/// before the response is written.
pub async fn place_order(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(request): Json<PlaceOrderRequest>,
) -> AppResult<Json<ApiResponse<PlaceOrderReceipt>>> {
    let key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::IdempotencyKeyRequired,
                "Idempotency-Key header is required",
            )
        })?;

    let receipt = state.orchestrator().place_order(key, request).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

/// Current order snapshot
pub async fn order_status(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.orchestrator().order_status(&order_id)?;
    Ok(Json(ApiResponse::success(order)))
}
