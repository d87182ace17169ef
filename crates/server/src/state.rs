use std::sync::Arc;

use easel_bridge::log::ConnectionLog;
use easel_bridge::{ConnectionState, EventRouter, PreviewSlot};
use easel_core::MemoryJobStore;
use easel_gateway::{AskRegistry, SessionManager};
use tokio::sync::{watch, Mutex};

use crate::config::ServerConfig;
use crate::resync::SchemaResync;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job records kept in sync by the bridge event router.
    pub store: Arc<Mutex<MemoryJobStore>>,
    /// Bridge event router (active pointer, session id, pending buffer).
    pub router: Arc<Mutex<EventRouter>>,
    /// Latest preview image, replaced on every preview frame.
    pub preview: Arc<Mutex<PreviewSlot>>,
    /// Rolling log of connection transitions.
    pub connection_log: Arc<Mutex<ConnectionLog>>,
    /// Live view of the backend connection state.
    pub connection_state: watch::Receiver<ConnectionState>,
    /// Consumer WebSocket sessions (browser clients).
    pub sessions: Arc<SessionManager>,
    /// Pending questions awaiting a consumer answer.
    pub asks: Arc<AskRegistry>,
    /// Backend capability resync handler, also serves schema stats.
    pub resync: Arc<SchemaResync>,
}
