//! Wire protocol between the gateway and a UI consumer.
//!
//! Both directions use JSON with the shape `{"type": "<kind>", "data":
//! {...}}`, matching the backend protocol so a consumer deals with one
//! envelope format.

use serde::{Deserialize, Serialize};

use easel_bridge::ConnectionState;
use easel_core::types::{JobId, NodeId};

/// Messages the gateway sends to a consumer.
///
/// Delivery order within one session is FIFO and survives the readiness
/// handshake: anything sent before the consumer's `ready` arrives is
/// queued and flushed in order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Backend link state changed.
    Connection {
        state: ConnectionState,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Backend queue depth.
    BackendStatus { queue_remaining: i32 },

    JobStarted {
        job_id: JobId,
    },

    JobProgress {
        job_id: JobId,
        value: i32,
        max: i32,
    },

    JobCached {
        job_id: JobId,
        nodes: Vec<NodeId>,
    },

    NodeExecuting {
        job_id: JobId,
        node: NodeId,
    },

    NodeOutput {
        job_id: JobId,
        node: NodeId,
        output: serde_json::Value,
    },

    JobCompleted {
        job_id: JobId,
    },

    JobFailed {
        job_id: JobId,
        node: NodeId,
        kind: String,
        message: String,
    },

    /// A fresh preview image is available for pickup.
    PreviewUpdated { mime: String },

    /// A running workflow wants a yes/no answer.
    AskBoolean { ask_id: String, question: String },

    /// A running workflow wants a free-text answer.
    AskText { ask_id: String, question: String },
}

/// Messages a consumer sends to the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ConsumerMessage {
    /// Greeting sent while the consumer is still mounting. Carries no
    /// state; logged and ignored.
    Hello { message: String },

    /// The consumer finished mounting and can receive messages. Flushes
    /// the session queue; the session never goes back to not-ready.
    Ready,

    /// Answer to an [`OutboundMessage::AskBoolean`].
    AnswerBoolean { ask_id: String, value: bool },

    /// Answer to an [`OutboundMessage::AskText`].
    AnswerText { ask_id: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_messages_use_the_envelope_shape() {
        let message = OutboundMessage::JobProgress {
            job_id: "j1".into(),
            value: 5,
            max: 20,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();

        assert_eq!(json["type"], "job_progress");
        assert_eq!(json["data"]["job_id"], "j1");
        assert_eq!(json["data"]["value"], 5);
    }

    #[test]
    fn connection_message_omits_absent_reason() {
        let message = OutboundMessage::Connection {
            state: ConnectionState::Open,
            reason: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();

        assert_eq!(json["data"]["state"], "open");
        assert!(json["data"].get("reason").is_none());
    }

    #[test]
    fn parse_ready() {
        let message: ConsumerMessage = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert!(matches!(message, ConsumerMessage::Ready));
    }

    #[test]
    fn parse_hello() {
        let message: ConsumerMessage =
            serde_json::from_str(r#"{"type":"hello","data":{"message":"webview mounted"}}"#)
                .unwrap();
        match message {
            ConsumerMessage::Hello { message } => assert_eq!(message, "webview mounted"),
            other => panic!("Expected Hello, got {other:?}"),
        }
    }

    #[test]
    fn parse_boolean_answer() {
        let message: ConsumerMessage =
            serde_json::from_str(r#"{"type":"answer_boolean","data":{"ask_id":"a1","value":true}}"#)
                .unwrap();
        match message {
            ConsumerMessage::AnswerBoolean { ask_id, value } => {
                assert_eq!(ask_id, "a1");
                assert!(value);
            }
            other => panic!("Expected AnswerBoolean, got {other:?}"),
        }
    }

    #[test]
    fn parse_text_answer() {
        let message: ConsumerMessage = serde_json::from_str(
            r#"{"type":"answer_text","data":{"ask_id":"a2","value":"dusk palette"}}"#,
        )
        .unwrap();
        match message {
            ConsumerMessage::AnswerText { ask_id, value } => {
                assert_eq!(ask_id, "a2");
                assert_eq!(value, "dusk palette");
            }
            other => panic!("Expected AnswerText, got {other:?}"),
        }
    }

    #[test]
    fn unknown_consumer_message_fails_to_parse() {
        assert!(serde_json::from_str::<ConsumerMessage>(r#"{"type":"dance"}"#).is_err());
    }
}
