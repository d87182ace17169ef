//! One consumer session.
//!
//! A session is created when a consumer's socket upgrades and destroyed
//! when it closes; reconnecting yields a brand-new session with a fresh
//! queue. Until the consumer announces readiness, outbound messages
//! accumulate in order; afterwards they go straight to the socket.

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use easel_core::types::{SessionId, Timestamp};
use easel_core::ReplayQueue;

use crate::messages::OutboundMessage;

/// Channel sender half for pushing frames to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// State for a single connected consumer.
pub struct ConsumerSession {
    pub id: SessionId,
    sender: WsSender,
    queue: ReplayQueue<OutboundMessage>,
    /// When this session was established.
    pub connected_at: Timestamp,
}

impl ConsumerSession {
    pub fn new(id: SessionId, sender: WsSender) -> Self {
        Self {
            id,
            sender,
            queue: ReplayQueue::new(),
            connected_at: chrono::Utc::now(),
        }
    }

    /// Deliver a message, or queue it if the consumer is not ready yet.
    pub fn send(&mut self, message: OutboundMessage) {
        if let Some(message) = self.queue.push(message) {
            self.transmit(&message);
        }
    }

    /// Open the gate and deliver everything queued, in order.
    ///
    /// Returns the number of flushed messages. Readiness is one-way; a
    /// second `ready` from the consumer flushes nothing.
    pub fn mark_ready(&mut self) -> usize {
        let queued = self.queue.flush();
        let count = queued.len();
        for message in &queued {
            self.transmit(message);
        }
        count
    }

    pub fn is_ready(&self) -> bool {
        self.queue.is_released()
    }

    /// Number of messages waiting on the handshake.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Push a raw frame, bypassing the readiness gate. Used for pings
    /// and close frames, which are socket-level rather than
    /// application-level traffic.
    pub fn send_frame(&self, frame: Message) {
        let _ = self.sender.send(frame);
    }

    fn transmit(&self, message: &OutboundMessage) {
        match serde_json::to_string(message) {
            Ok(text) => {
                // A closed channel means the socket task is shutting
                // down; the session is about to be removed.
                let _ = self.sender.send(Message::Text(text.into()));
            }
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "Failed to serialize outbound message");
            }
        }
    }
}
