//! Backend WebSocket event types and parser.
//!
//! The backend sends JSON messages over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`. This module deserializes them
//! into a strongly-typed [`BackendEvent`] enum and distinguishes frames
//! that are merely malformed from frames carrying an event kind this
//! build does not know about.

use serde::Deserialize;

/// All known backend WebSocket event kinds.
///
/// Deserialized via the internally-tagged `"type"` field with
/// associated `"data"` content.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BackendEvent {
    /// Server status broadcast (queue depth, session id on first send).
    #[serde(rename = "status")]
    Status(StatusData),

    /// A job has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartData),

    /// Some nodes were skipped because their outputs are cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A specific node is currently executing (or execution finished when `node` is `None`).
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Progress update from a long-running node. Carries no job id; it
    /// is attributed to whichever job last sent a job-scoped event.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node has finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// Execution failed with an error.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

/// Queue status information.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    /// Backend-assigned session id. Only present on the first status
    /// broadcast after a connection is established.
    #[serde(default)]
    pub sid: Option<String>,
    pub status: QueueStatus,
}

/// Current queue state.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

/// Execution queue statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

/// Payload for `execution_start` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartData {
    pub prompt_id: String,
}

/// Payload for `execution_cached` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    /// Node IDs whose outputs were served from cache.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload for `executing` events.
///
/// When `node` is `None`, execution of the job has completed.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Payload for `progress` events (step-level progress within a node).
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
}

/// Payload for `executed` events (node output).
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    /// The node that produced this output.
    pub node: String,
    /// Raw output value (images, filenames, etc.).
    pub output: serde_json::Value,
    pub prompt_id: String,
}

/// Payload for `execution_error` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    pub node_id: String,
    pub exception_message: String,
    pub exception_type: String,
}

/// Event kinds this build understands. Used to tell a bad payload apart
/// from a tag no handler branch exists for.
const KNOWN_KINDS: [&str; 7] = [
    "status",
    "execution_start",
    "execution_cached",
    "executing",
    "progress",
    "executed",
    "execution_error",
];

/// Minimal envelope used to recover the tag from a frame that failed
/// full deserialization.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Why a text frame could not be turned into a [`BackendEvent`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Well-formed JSON whose `type` tag matches no known event kind.
    ///
    /// This is a protocol/version mismatch, not line noise, and callers
    /// must not swallow it: doing so would silently ignore a whole
    /// class of backend events.
    #[error("unknown backend event kind `{kind}`")]
    UnknownKind { kind: String },

    /// Invalid JSON, or a known kind with an unusable payload. Fatal
    /// for this frame only.
    #[error("malformed backend event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse a backend WebSocket text frame into a typed event.
///
/// Callers should log [`DecodeError::Malformed`] and continue, but must
/// treat [`DecodeError::UnknownKind`] as fatal for the connection.
pub fn parse_event(text: &str) -> Result<BackendEvent, DecodeError> {
    match serde_json::from_str::<BackendEvent>(text) {
        Ok(event) => Ok(event),
        Err(err) => {
            // Work out whether the tag itself was the problem. serde
            // reports both cases as the same error, and they demand
            // opposite handling.
            if let Ok(envelope) = serde_json::from_str::<RawEnvelope>(text) {
                if !KNOWN_KINDS.contains(&envelope.kind.as_str()) {
                    return Err(DecodeError::UnknownKind {
                        kind: envelope.kind,
                    });
                }
            }
            Err(DecodeError::Malformed(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_status_event() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":3}}}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::Status(data) => {
                assert_eq!(data.status.exec_info.queue_remaining, 3);
                assert!(data.sid.is_none());
            }
            other => panic!("Expected Status, got {other:?}"),
        }
    }

    #[test]
    fn parse_status_with_session_id() {
        let json = r#"{"type":"status","data":{"sid":"sess-9","status":{"exec_info":{"queue_remaining":0}}}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::Status(data) => {
                assert_eq!(data.sid.as_deref(), Some("sess-9"));
            }
            other => panic!("Expected Status, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_start_event() {
        let json = r#"{"type":"execution_start","data":{"prompt_id":"abc-123"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::ExecutionStart(data) => {
                assert_eq!(data.prompt_id, "abc-123");
            }
            other => panic!("Expected ExecutionStart, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_cached_event() {
        let json =
            r#"{"type":"execution_cached","data":{"prompt_id":"abc","nodes":["1","2","3"]}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::ExecutionCached(data) => {
                assert_eq!(data.prompt_id, "abc");
                assert_eq!(data.nodes, vec!["1", "2", "3"]);
            }
            other => panic!("Expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_cached_without_nodes() {
        let json = r#"{"type":"execution_cached","data":{"prompt_id":"abc"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::ExecutionCached(data) => {
                assert!(data.nodes.is_empty());
            }
            other => panic!("Expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn parse_executing_with_node() {
        let json = r#"{"type":"executing","data":{"node":"42","prompt_id":"xyz"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::Executing(data) => {
                assert_eq!(data.node.as_deref(), Some("42"));
                assert_eq!(data.prompt_id, "xyz");
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn parse_executing_finished() {
        let json = r#"{"type":"executing","data":{"node":null,"prompt_id":"xyz"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::Executing(data) => {
                assert!(data.node.is_none());
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn parse_progress_event() {
        let json = r#"{"type":"progress","data":{"value":5,"max":20}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::Progress(data) => {
                assert_eq!(data.value, 5);
                assert_eq!(data.max, 20);
            }
            other => panic!("Expected Progress, got {other:?}"),
        }
    }

    #[test]
    fn parse_executed_event() {
        let json = r#"{"type":"executed","data":{"node":"9","output":{"images":[{"filename":"out.png"}]},"prompt_id":"abc"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::Executed(data) => {
                assert_eq!(data.node, "9");
                assert_eq!(data.prompt_id, "abc");
                assert!(data.output.is_object());
            }
            other => panic!("Expected Executed, got {other:?}"),
        }
    }

    #[test]
    fn parse_execution_error_event() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"abc","node_id":"5","exception_message":"out of memory","exception_type":"RuntimeError"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            BackendEvent::ExecutionError(data) => {
                assert_eq!(data.prompt_id, "abc");
                assert_eq!(data.node_id, "5");
                assert_eq!(data.exception_message, "out of memory");
                assert_eq!(data.exception_type, "RuntimeError");
            }
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_not_malformed() {
        let json = r#"{"type":"crystools.monitor","data":{"cpu":12}}"#;
        let err = parse_event(json).unwrap_err();
        assert_matches!(err, DecodeError::UnknownKind { kind } if kind == "crystools.monitor");
    }

    #[test]
    fn known_kind_with_bad_payload_is_malformed() {
        // `executing` requires a prompt_id; the frame is damaged, not a
        // protocol mismatch.
        let json = r#"{"type":"executing","data":{"node":"42"}}"#;
        let err = parse_event(json).unwrap_err();
        assert_matches!(err, DecodeError::Malformed(_));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_event("not json at all").unwrap_err();
        assert_matches!(err, DecodeError::Malformed(_));
    }

    #[test]
    fn missing_tag_is_malformed() {
        let err = parse_event(r#"{"data":{"value":1}}"#).unwrap_err();
        assert_matches!(err, DecodeError::Malformed(_));
    }
}
