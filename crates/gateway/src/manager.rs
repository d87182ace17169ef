//! Registry of all live consumer sessions.
//!
//! Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
//! and shared between the socket handlers, the bridge relay, and the
//! heartbeat task.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

use easel_core::types::SessionId;

use crate::messages::OutboundMessage;
use crate::session::ConsumerSession;

/// Manages all active consumer sessions.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, ConsumerSession>>,
}

impl SessionManager {
    /// Create a new, empty session manager.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session.
    ///
    /// Returns the receiver half of the frame channel so the caller can
    /// forward frames to the WebSocket sink. The session starts
    /// not-ready; application messages queue until [`mark_ready`].
    ///
    /// [`mark_ready`]: SessionManager::mark_ready
    pub async fn add(&self, session_id: SessionId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ConsumerSession::new(session_id.clone(), tx);
        self.sessions.write().await.insert(session_id, session);
        rx
    }

    /// Remove a session by its ID.
    pub async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Flush a session's queue after its readiness handshake.
    ///
    /// Returns the number of flushed messages, or `None` when the
    /// session is gone (closed between the frame arriving and now).
    pub async fn mark_ready(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .write()
            .await
            .get_mut(session_id)
            .map(ConsumerSession::mark_ready)
    }

    /// Send a message to one session, respecting its readiness gate.
    ///
    /// Returns `false` when no such session exists.
    pub async fn send_to(&self, session_id: &str, message: OutboundMessage) -> bool {
        match self.sessions.write().await.get_mut(session_id) {
            Some(session) => {
                session.send(message);
                true
            }
            None => false,
        }
    }

    /// Send a message to every session, respecting each readiness gate.
    ///
    /// Sessions whose send channels are closed are silently skipped
    /// (they are cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: OutboundMessage) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut() {
            session.send(message.clone());
        }
    }

    /// Return the current number of active sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of sessions that completed the readiness handshake.
    pub async fn ready_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_ready())
            .count()
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown to notify all consumers before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for session in sessions.values() {
            session.send_frame(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all consumer sessions");
    }

    /// Send a Ping frame to every session.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones. Pings bypass the readiness gate.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            session.send_frame(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
