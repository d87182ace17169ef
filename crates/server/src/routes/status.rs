use axum::extract::State;
use axum::{routing::get, Json, Router};
use easel_bridge::log::LogEntry;
use easel_bridge::ConnectionState;
use serde::Serialize;

use crate::state::AppState;

/// Diagnostic snapshot of the sync layer.
#[derive(Serialize)]
pub struct StatusResponse {
    /// Current backend link state.
    pub connection: ConnectionState,
    /// Session id announced by the backend on this connection, if any.
    pub session_id: Option<String>,
    /// Backend queue depth from the last status event.
    pub queue_remaining: Option<i32>,
    /// Job the execution stream is currently about.
    pub active_job: Option<String>,
    /// Jobs with events buffered ahead of record registration.
    pub pending_jobs: usize,
    /// Node kinds in the last capability resync.
    pub known_node_kinds: usize,
    /// Connected consumer sessions.
    pub consumers: usize,
    /// Consumer sessions that have completed the readiness handshake.
    pub consumers_ready: usize,
    /// Recent connection transitions, oldest first.
    pub log: Vec<LogEntry>,
}

/// GET /status -- diagnostic snapshot for operators and the UI shell.
pub async fn connection_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let connection = *state.connection_state.borrow();

    let (session_id, queue_remaining, active_job, pending_jobs) = {
        let router = state.router.lock().await;
        (
            router.session_id().map(ToOwned::to_owned),
            router.queue_remaining(),
            router.active_job().map(ToOwned::to_owned),
            router.pending_jobs(),
        )
    };

    let log = state.connection_log.lock().await.snapshot();

    Json(StatusResponse {
        connection,
        session_id,
        queue_remaining,
        active_job,
        pending_jobs,
        known_node_kinds: state.resync.known_node_kinds(),
        consumers: state.sessions.session_count().await,
        consumers_ready: state.sessions.ready_count().await,
        log,
    })
}

/// Mount status routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(connection_status))
}
