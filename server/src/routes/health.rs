//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Users currently held by the store
    pub user_count: usize,
    /// Simulated latency in milliseconds
    pub latency_ms: u64,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler. Reads the store directly, without simulated latency.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        user_count: state.store.len().await,
        latency_ms: state.config.latency.as_millis() as u64,
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Tether User Service"
}
