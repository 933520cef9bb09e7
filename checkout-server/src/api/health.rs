//! Health Routes

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::time::SystemTime;

use crate::core::ServerState;

/// Health check router - public route (no signature required)
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    uptime_seconds: u64,
    /// Orders awaiting operator reconciliation
    flagged_orders: usize,
    /// Live idempotency records
    ledger_entries: usize,
}

// Server start time (lazy static)
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

fn uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config().environment.clone(),
        uptime_seconds: uptime_seconds(),
        flagged_orders: state.orchestrator().orders().find_flagged().len(),
        ledger_entries: state.orchestrator().ledger().len(),
    })
}
