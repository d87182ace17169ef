use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{routing::get, Router};

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the socket is handed to the gateway, which owns
/// the session lifecycle and the readiness handshake.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| easel_gateway::handle_socket(socket, state.sessions, state.asks))
}

/// Mount the consumer WebSocket route.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}
