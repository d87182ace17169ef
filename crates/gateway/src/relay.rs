//! Fan-out from bridge events to consumer sessions.
//!
//! One task subscribes to the bridge's broadcast channel, translates
//! each [`BridgeEvent`] into the consumer wire protocol, and hands it
//! to the [`SessionManager`], which applies each session's readiness
//! gate.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use easel_bridge::{BridgeEvent, ConnectionState};

use crate::manager::SessionManager;
use crate::messages::OutboundMessage;

/// Map one bridge event onto the consumer protocol.
pub fn translate(event: &BridgeEvent) -> OutboundMessage {
    match event {
        BridgeEvent::Connected => OutboundMessage::Connection {
            state: ConnectionState::Open,
            reason: None,
        },
        BridgeEvent::Disconnected { reason } => OutboundMessage::Connection {
            state: ConnectionState::Closed,
            reason: Some(reason.clone()),
        },
        BridgeEvent::BackendStatus { queue_remaining } => OutboundMessage::BackendStatus {
            queue_remaining: *queue_remaining,
        },
        BridgeEvent::JobStarted { job_id } => OutboundMessage::JobStarted {
            job_id: job_id.clone(),
        },
        BridgeEvent::JobProgress { job_id, value, max } => OutboundMessage::JobProgress {
            job_id: job_id.clone(),
            value: *value,
            max: *max,
        },
        BridgeEvent::JobCached { job_id, nodes } => OutboundMessage::JobCached {
            job_id: job_id.clone(),
            nodes: nodes.clone(),
        },
        BridgeEvent::NodeExecuting { job_id, node } => OutboundMessage::NodeExecuting {
            job_id: job_id.clone(),
            node: node.clone(),
        },
        BridgeEvent::NodeOutput {
            job_id,
            node,
            output,
        } => OutboundMessage::NodeOutput {
            job_id: job_id.clone(),
            node: node.clone(),
            output: output.clone(),
        },
        BridgeEvent::JobCompleted { job_id } => OutboundMessage::JobCompleted {
            job_id: job_id.clone(),
        },
        BridgeEvent::JobFailed {
            job_id,
            node,
            kind,
            message,
        } => OutboundMessage::JobFailed {
            job_id: job_id.clone(),
            node: node.clone(),
            kind: kind.clone(),
            message: message.clone(),
        },
        BridgeEvent::PreviewUpdated { kind } => OutboundMessage::PreviewUpdated {
            mime: kind.mime().to_owned(),
        },
    }
}

/// Spawn the relay task.
///
/// Runs until cancelled or until the bridge side of the channel closes.
pub fn start_relay(
    mut events: broadcast::Receiver<BridgeEvent>,
    sessions: Arc<SessionManager>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => {
                        sessions.broadcast(translate(&event)).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Sessions missed events; keep going with the
                        // current stream position.
                        tracing::warn!(skipped, "Relay lagged behind bridge events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        tracing::info!("Consumer relay stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_events_map_to_state_changes() {
        let message = translate(&BridgeEvent::Connected);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();
        assert_eq!(json["type"], "connection");
        assert_eq!(json["data"]["state"], "open");

        let message = translate(&BridgeEvent::Disconnected {
            reason: "closed by backend".into(),
        });
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();
        assert_eq!(json["data"]["state"], "closed");
        assert_eq!(json["data"]["reason"], "closed by backend");
    }

    #[test]
    fn preview_translates_to_mime() {
        let message = translate(&BridgeEvent::PreviewUpdated {
            kind: easel_bridge::PreviewKind::Png,
        });
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();
        assert_eq!(json["type"], "preview_updated");
        assert_eq!(json["data"]["mime"], "image/png");
    }

    #[tokio::test]
    async fn relay_delivers_to_ready_sessions() {
        let sessions = Arc::new(SessionManager::new());
        let (tx, rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let mut frames = sessions.add("s1".into()).await;
        sessions.mark_ready("s1").await;

        let relay = start_relay(rx, Arc::clone(&sessions), cancel.clone());

        tx.send(BridgeEvent::JobStarted {
            job_id: "j1".into(),
        })
        .unwrap();

        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), frames.recv())
            .await
            .expect("relay should deliver within a second")
            .expect("channel open");
        let axum::extract::ws::Message::Text(text) = frame else {
            panic!("Expected Text frame, got {frame:?}")
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "job_started");

        cancel.cancel();
        relay.await.unwrap();
    }
}
