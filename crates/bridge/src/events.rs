//! Bridge-level events broadcast to the rest of the service.
//!
//! Emitted by the event router and the connection driver as backend
//! frames arrive. Subscribers (the consumer relay, primarily) receive
//! them via a [`tokio::sync::broadcast`] channel.

use easel_core::types::{JobId, NodeId};

use crate::frames::PreviewKind;

/// Events describing backend activity, in arrival order.
///
/// Job-scoped variants are emitted when the backend frame arrives, even
/// if the local job record does not exist yet. Replaying buffered
/// events into a late-created record updates the record only and never
/// re-emits, so subscribers see each backend frame exactly once.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// Socket to the backend established.
    Connected,

    /// Socket to the backend lost; reconnection is underway unless the
    /// bridge is shutting down.
    Disconnected { reason: String },

    /// Global queue status broadcast.
    BackendStatus { queue_remaining: i32 },

    /// A job has started executing.
    JobStarted { job_id: JobId },

    /// Step progress for the active job.
    JobProgress { job_id: JobId, value: i32, max: i32 },

    /// Nodes served from the backend's output cache.
    JobCached { job_id: JobId, nodes: Vec<NodeId> },

    /// A node began executing.
    NodeExecuting { job_id: JobId, node: NodeId },

    /// A node finished and emitted an artifact.
    NodeOutput {
        job_id: JobId,
        node: NodeId,
        output: serde_json::Value,
    },

    /// All nodes done (`executing` with a null node).
    JobCompleted { job_id: JobId },

    /// Execution failed.
    JobFailed {
        job_id: JobId,
        node: NodeId,
        kind: String,
        message: String,
    },

    /// A new preview image replaced the previous one.
    PreviewUpdated { kind: PreviewKind },
}
