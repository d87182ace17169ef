use axum::extract::State;
use axum::{routing::get, Json, Router};
use easel_bridge::ConnectionState;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the backend WebSocket is currently open.
    pub backend_connected: bool,
}

/// GET /health -- returns service and backend-link health.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_connected = *state.connection_state.borrow() == ConnectionState::Open;

    let status = if backend_connected { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        backend_connected,
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
