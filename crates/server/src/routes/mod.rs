pub mod health;
pub mod jobs;
pub mod preview;
pub mod status;
pub mod ws;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health       service and backend-link health
/// /status       connection state, rolling log, backend globals
/// /preview      latest preview image (GET consumes it)
/// /jobs/{id}    register record (POST), inspect record (GET)
/// /ws           consumer WebSocket
/// ```
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(status::router())
        .merge(preview::router())
        .merge(jobs::router())
        .merge(ws::router())
}
