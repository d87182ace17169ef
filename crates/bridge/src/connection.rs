//! Backend connection lifecycle.
//!
//! [`Bridge`] owns the socket to the compute backend: it connects,
//! pumps frames through the decoder and router, reconnects with backoff
//! when the link drops, and resynchronizes capability state after every
//! successful connect. Connection state is published through a
//! [`tokio::sync::watch`] channel so any number of observers can follow
//! the `connecting -> open -> closed` transitions without touching the
//! driver itself.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use easel_core::MemoryJobStore;

use crate::client::{BackendClient, BackendConnection};
use crate::events::BridgeEvent;
use crate::frames::{decode_binary_frame, PreviewSlot};
use crate::log::ConnectionLog;
use crate::messages::{parse_event, DecodeError};
use crate::reconnect::{reconnect_loop, ReconnectConfig};
use crate::router::EventRouter;

/// Broadcast channel capacity for bridge events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of the backend link as observed by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Failure reported by a [`ResyncHandler`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ResyncError(pub String);

/// Re-fetches authoritative backend state after a (re)connection.
///
/// The bridge does not know what that state is; it only guarantees the
/// callback runs exactly once per successful connect, after routing
/// state from the previous connection has been cleared.
#[async_trait]
pub trait ResyncHandler: Send + Sync {
    async fn resync(&self) -> Result<(), ResyncError>;
}

/// Errors that abort the bridge instead of triggering a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The backend speaks a protocol revision this build does not.
    /// Reconnecting would silently ignore a whole class of events, so
    /// the bridge refuses to continue.
    #[error("protocol mismatch: unknown backend event kind `{kind}`")]
    ProtocolMismatch { kind: String },
}

/// Driver for the persistent backend connection.
///
/// Construct with [`Bridge::new`], clone out the shared handles the
/// rest of the service needs, then hand the bridge to a task running
/// [`Bridge::run`].
pub struct Bridge {
    client: BackendClient,
    reconnect: ReconnectConfig,
    resync: Arc<dyn ResyncHandler>,
    router: Arc<Mutex<EventRouter>>,
    store: Arc<Mutex<MemoryJobStore>>,
    preview: Arc<Mutex<PreviewSlot>>,
    log: Arc<Mutex<ConnectionLog>>,
    events: broadcast::Sender<BridgeEvent>,
    state_tx: watch::Sender<ConnectionState>,
    /// Kept so `state_tx.send` cannot fail while the bridge lives.
    _state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl Bridge {
    pub fn new(
        ws_url: String,
        reconnect: ReconnectConfig,
        resync: Arc<dyn ResyncHandler>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        Self {
            client: BackendClient::new(ws_url),
            reconnect,
            resync,
            router: Arc::new(Mutex::new(EventRouter::new())),
            store: Arc::new(Mutex::new(MemoryJobStore::new())),
            preview: Arc::new(Mutex::new(PreviewSlot::new())),
            log: Arc::new(Mutex::new(ConnectionLog::new())),
            events,
            state_tx,
            _state_rx: state_rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Shared job store, for the submission endpoints.
    pub fn store(&self) -> Arc<Mutex<MemoryJobStore>> {
        Arc::clone(&self.store)
    }

    /// Shared router, for announcing record creation.
    pub fn router(&self) -> Arc<Mutex<EventRouter>> {
        Arc::clone(&self.router)
    }

    /// Latest preview image slot.
    pub fn preview(&self) -> Arc<Mutex<PreviewSlot>> {
        Arc::clone(&self.preview)
    }

    /// Rolling connection log.
    pub fn log(&self) -> Arc<Mutex<ConnectionLog>> {
        Arc::clone(&self.log)
    }

    /// Observe connection-state transitions.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to bridge events.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Token that stops the run loop and any in-flight reconnect wait.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connect and keep the link alive until cancelled.
    ///
    /// Returns `Err` only for a protocol mismatch; every socket-level
    /// failure feeds the reconnect policy instead.
    pub async fn run(self) -> Result<(), BridgeError> {
        loop {
            let conn = match self.establish().await {
                Some(conn) => conn,
                // Cancelled while connecting.
                None => {
                    self.set_state(ConnectionState::Closed);
                    return Ok(());
                }
            };

            self.on_connected(&conn.client_id).await;

            match self.pump(conn.ws_stream).await {
                Ok(reason) => self.on_disconnected(&reason).await,
                Err(e) => {
                    self.on_disconnected(&e.to_string()).await;
                    return Err(e);
                }
            }

            if self.cancel.is_cancelled() {
                return Ok(());
            }
        }
    }

    /// One connection attempt, falling back to the backoff loop.
    async fn establish(&self) -> Option<BackendConnection> {
        self.set_state(ConnectionState::Connecting);
        match self.client.connect().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
                self.log_error(format!("connect failed: {e}")).await;
                reconnect_loop(&self.client, &self.reconnect, &self.cancel).await
            }
        }
    }

    /// Per-connect side effects, run before the first frame is read.
    async fn on_connected(&self, client_id: &str) {
        self.set_state(ConnectionState::Open);
        self.log_info(format!("connected as {client_id}")).await;

        // The backend does not carry jobs across a restart; routing
        // state from the previous connection is stale.
        self.router.lock().await.reset();

        if let Err(e) = self.resync.resync().await {
            tracing::error!(error = %e, "Post-connect resync failed");
            self.log_error(format!("resync failed: {e}")).await;
        }

        let _ = self.events.send(BridgeEvent::Connected);
    }

    async fn on_disconnected(&self, reason: &str) {
        self.set_state(ConnectionState::Closed);
        self.log_info(format!("disconnected: {reason}")).await;
        let _ = self.events.send(BridgeEvent::Disconnected {
            reason: reason.to_owned(),
        });
    }

    /// Read frames until the socket dies or the bridge is cancelled.
    ///
    /// Returns the human-readable close reason, or `Err` on a protocol
    /// mismatch.
    async fn pump(
        &self,
        mut ws_stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) -> Result<String, BridgeError> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = ws_stream.close(None).await;
                    return Ok("shutting down".into());
                }
                frame = ws_stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text).await?,
                    Some(Ok(Message::Binary(bytes))) => self.handle_binary(&bytes).await,
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Backend WebSocket closed");
                        return Ok("closed by backend".into());
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket receive error");
                        return Ok(format!("receive error: {e}"));
                    }
                    None => return Ok("stream ended".into()),
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<(), BridgeError> {
        match parse_event(text) {
            Ok(event) => {
                // Lock order everywhere is router, then store.
                let mut router = self.router.lock().await;
                let mut store = self.store.lock().await;
                router.handle(event, &mut *store, &self.events);
            }
            Err(DecodeError::UnknownKind { kind }) => {
                tracing::error!(
                    kind = %kind,
                    "Backend sent an event kind this build does not handle",
                );
                self.log_error(format!("unknown event kind `{kind}`")).await;
                return Err(BridgeError::ProtocolMismatch { kind });
            }
            Err(e) => {
                tracing::warn!(error = %e, raw_message = %text, "Dropping malformed backend frame");
            }
        }
        Ok(())
    }

    async fn handle_binary(&self, bytes: &[u8]) {
        match decode_binary_frame(bytes) {
            Ok(artifact) => {
                let kind = artifact.kind;
                tracing::trace!(?kind, len = artifact.bytes.len(), "Preview frame received");
                self.preview.lock().await.store(artifact);
                let _ = self.events.send(BridgeEvent::PreviewUpdated { kind });
            }
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "Dropping undecodable binary frame");
                self.log_error(format!("binary frame: {e}")).await;
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    async fn log_info(&self, message: String) {
        self.log.lock().await.info(message);
    }

    async fn log_error(&self, message: String) {
        self.log.lock().await.error(message);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use easel_core::{JobPhase, JobRecord};

    use super::*;

    struct CountingResync {
        calls: AtomicUsize,
    }

    impl CountingResync {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ResyncHandler for CountingResync {
        async fn resync(&self) -> Result<(), ResyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_bridge(resync: Arc<CountingResync>) -> Bridge {
        Bridge::new(
            "ws://localhost:9999".into(),
            ReconnectConfig::default(),
            resync,
        )
    }

    #[tokio::test]
    async fn connect_resets_router_and_resyncs_once() {
        let resync = CountingResync::new();
        let bridge = test_bridge(Arc::clone(&resync));
        let state = bridge.connection_state();
        let mut events = bridge.subscribe();

        // Leave stale routing state from a "previous connection".
        bridge
            .handle_text(r#"{"type":"execution_start","data":{"prompt_id":"old-job"}}"#)
            .await
            .unwrap();
        assert_eq!(
            bridge.router.lock().await.active_job(),
            Some("old-job")
        );

        bridge.on_connected("client-1").await;

        assert_eq!(resync.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*state.borrow(), ConnectionState::Open);
        {
            let router = bridge.router.lock().await;
            assert!(router.active_job().is_none());
            assert_eq!(router.pending_jobs(), 0);
        }
        assert!(!bridge.log.lock().await.is_empty());

        // One resync per successful connect.
        bridge.on_connected("client-2").await;
        assert_eq!(resync.calls.load(Ordering::SeqCst), 2);

        // Arrival event, then the two Connected notifications.
        assert_matches!(events.try_recv(), Ok(BridgeEvent::JobStarted { .. }));
        assert_matches!(events.try_recv(), Ok(BridgeEvent::Connected));
        assert_matches!(events.try_recv(), Ok(BridgeEvent::Connected));
    }

    #[tokio::test]
    async fn unknown_event_kind_aborts() {
        let bridge = test_bridge(CountingResync::new());

        let err = bridge
            .handle_text(r#"{"type":"surprise","data":{}}"#)
            .await
            .unwrap_err();
        assert_matches!(err, BridgeError::ProtocolMismatch { kind } if kind == "surprise");
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_not_fatal() {
        let bridge = test_bridge(CountingResync::new());

        bridge.handle_text("{ not json").await.unwrap();
        bridge
            .handle_text(r#"{"type":"executing","data":{"node":"7"}}"#)
            .await
            .unwrap();

        // Nothing routed, nothing buffered.
        assert_eq!(bridge.router.lock().await.pending_jobs(), 0);
    }

    #[tokio::test]
    async fn routed_frames_reach_the_store() {
        let bridge = test_bridge(CountingResync::new());
        bridge
            .store
            .lock()
            .await
            .insert(JobRecord::new("j1"))
            .unwrap();

        bridge
            .handle_text(r#"{"type":"execution_start","data":{"prompt_id":"j1"}}"#)
            .await
            .unwrap();

        let store = bridge.store.lock().await;
        assert_eq!(store.get("j1").unwrap().phase, JobPhase::Running);
    }

    #[tokio::test]
    async fn binary_frames_fill_the_preview_slot() {
        let bridge = test_bridge(CountingResync::new());
        let mut events = bridge.subscribe();

        let mut frame = Vec::new();
        frame.extend_from_slice(&1u32.to_be_bytes());
        frame.extend_from_slice(&2u32.to_be_bytes());
        frame.extend_from_slice(b"png-bytes");
        bridge.handle_binary(&frame).await;

        let artifact = bridge.preview.lock().await.take().expect("preview stored");
        assert_eq!(artifact.bytes, b"png-bytes");
        assert_matches!(events.try_recv(), Ok(BridgeEvent::PreviewUpdated { .. }));
    }

    #[tokio::test]
    async fn undecodable_binary_frame_is_logged_and_dropped() {
        let bridge = test_bridge(CountingResync::new());

        bridge.handle_binary(&[0, 0, 0, 9, 1, 2, 3, 4]).await;

        assert!(bridge.preview.lock().await.is_empty());
        assert!(!bridge.log.lock().await.is_empty());
    }
}
