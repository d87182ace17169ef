//! Per-socket consumer handling after the HTTP upgrade.
//!
//! Splits the socket into a sink (outbound) and stream (inbound), then:
//!   1. Registers the session with [`SessionManager`].
//!   2. Spawns a sender task that forwards frames from the session channel.
//!   3. Dispatches inbound consumer messages on the current task.
//!   4. Cleans up on disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};

use crate::ask::AskRegistry;
use crate::manager::SessionManager;
use crate::messages::ConsumerMessage;

/// Manage a single consumer WebSocket connection after upgrade.
pub async fn handle_socket(socket: WebSocket, sessions: Arc<SessionManager>, asks: Arc<AskRegistry>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(session_id = %session_id, "Consumer connected");

    // Register and get the receiver for outbound frames.
    let mut rx = sessions.add(session_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel frames to the WebSocket sink.
    let sender_session_id = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(frame).await.is_err() {
                tracing::debug!(session_id = %sender_session_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: dispatch inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(session_id = %session_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                dispatch(&text, &session_id, &sessions, &asks).await;
            }
            Ok(_other) => {
                // Consumers have no binary protocol.
            }
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove session and abort sender task. A consumer that
    // reconnects gets a fresh session with a fresh queue.
    sessions.remove(&session_id).await;
    send_task.abort();
    tracing::info!(session_id = %session_id, "Consumer disconnected");
}

/// Handle one inbound consumer message.
///
/// Consumer chatter this build does not understand is logged and
/// ignored. Unlike the backend link there is no version contract with
/// arbitrary consumers, so an unknown message is noise, not a fatal
/// mismatch.
async fn dispatch(text: &str, session_id: &str, sessions: &SessionManager, asks: &AskRegistry) {
    let message: ConsumerMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(session_id, error = %e, "Ignoring unparseable consumer message");
            return;
        }
    };

    match message {
        ConsumerMessage::Hello { message } => {
            tracing::debug!(session_id, message = %message, "Consumer greeting");
        }
        ConsumerMessage::Ready => match sessions.mark_ready(session_id).await {
            Some(flushed) => {
                tracing::info!(session_id, flushed, "Consumer ready, queue flushed");
            }
            None => {
                tracing::debug!(session_id, "Ready from a session already removed");
            }
        },
        ConsumerMessage::AnswerBoolean { ask_id, value } => {
            if let Err(e) = asks.answer_boolean(&ask_id, value).await {
                tracing::warn!(session_id, ask_id = %ask_id, error = %e, "Boolean answer not delivered");
            }
        }
        ConsumerMessage::AnswerText { ask_id, value } => {
            if let Err(e) = asks.answer_text(&ask_id, value).await {
                tracing::warn!(session_id, ask_id = %ask_id, error = %e, "Text answer not delivered");
            }
        }
    }
}
