//! Job records and the job-scoped events that mutate them.
//!
//! A [`JobRecord`] is the local mirror of one backend execution. It is
//! created by the submitter (outside this layer) and updated exclusively
//! through [`JobRecord::apply`], which is the single dispatch point for
//! every job-scoped event the backend emits.

use serde::Serialize;

use crate::types::{JobId, NodeId, Timestamp};

/// Lifecycle phase of a job as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Record exists, no execution event received yet.
    Queued,
    /// The backend started executing the job.
    Running,
    /// The backend finished all nodes (`executing` with a null node).
    Completed,
    /// The backend reported an execution error.
    Failed,
}

/// Step-level progress within the currently executing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
}

/// One artifact emitted by a finished node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutput {
    /// The node that produced this output.
    pub node: NodeId,
    /// Raw output value (images, filenames, etc.) as sent by the backend.
    pub output: serde_json::Value,
}

/// Details of a failed execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionFailure {
    pub node: NodeId,
    pub kind: String,
    pub message: String,
}

/// A job-scoped event, stripped of its job id.
///
/// This is the unit the pending buffer holds and replays: the job id is
/// the buffer key, so the event itself only carries the payload.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Execution of the job began.
    Start,
    /// Listed nodes were served from the backend's cache.
    Cached { nodes: Vec<NodeId> },
    /// A node started executing, or execution finished when `node` is `None`.
    Executing { node: Option<NodeId> },
    /// A node finished and emitted an artifact.
    Executed {
        node: NodeId,
        output: serde_json::Value,
    },
    /// Execution failed.
    Error {
        node: NodeId,
        kind: String,
        message: String,
    },
    /// Step progress within the currently executing node.
    Progress { value: i32, max: i32 },
}

/// Local mirror of one backend execution.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub phase: JobPhase,
    /// Last reported step progress, if any.
    pub progress: Option<Progress>,
    /// The node currently executing, `None` between nodes or after
    /// completion.
    pub current_node: Option<NodeId>,
    /// Nodes whose outputs were served from cache.
    pub cached_nodes: Vec<NodeId>,
    /// Artifacts appended in the order their `executed` events arrived.
    pub outputs: Vec<NodeOutput>,
    pub failure: Option<ExecutionFailure>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// Create a fresh record in the `Queued` phase.
    pub fn new(id: impl Into<JobId>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: id.into(),
            phase: JobPhase::Queued,
            progress: None,
            current_node: None,
            cached_nodes: Vec::new(),
            outputs: Vec::new(),
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one job-scoped event to this record.
    ///
    /// The match is exhaustive: adding a [`JobEvent`] variant without a
    /// handling arm is a compile error, which is exactly the guarantee
    /// the routing layer relies on.
    pub fn apply(&mut self, event: &JobEvent) {
        match event {
            JobEvent::Start => {
                self.phase = JobPhase::Running;
            }
            JobEvent::Cached { nodes } => {
                self.phase = JobPhase::Running;
                self.cached_nodes.extend(nodes.iter().cloned());
            }
            JobEvent::Executing { node } => match node {
                Some(node) => {
                    self.phase = JobPhase::Running;
                    self.current_node = Some(node.clone());
                }
                // A null node reference means nothing is executing any
                // more: the job is done. Must not be treated as an error.
                None => {
                    self.current_node = None;
                    if self.phase != JobPhase::Failed {
                        self.phase = JobPhase::Completed;
                    }
                }
            },
            JobEvent::Executed { node, output } => {
                self.current_node = None;
                self.outputs.push(NodeOutput {
                    node: node.clone(),
                    output: output.clone(),
                });
            }
            JobEvent::Error {
                node,
                kind,
                message,
            } => {
                self.phase = JobPhase::Failed;
                self.current_node = None;
                self.failure = Some(ExecutionFailure {
                    node: node.clone(),
                    kind: kind.clone(),
                    message: message.clone(),
                });
            }
            JobEvent::Progress { value, max } => {
                self.progress = Some(Progress {
                    value: *value,
                    max: *max,
                });
            }
        }
        self.updated_at = chrono::Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_queued() {
        let record = JobRecord::new("job-1");
        assert_eq!(record.phase, JobPhase::Queued);
        assert!(record.progress.is_none());
        assert!(record.current_node.is_none());
        assert!(record.outputs.is_empty());
    }

    #[test]
    fn start_moves_to_running() {
        let mut record = JobRecord::new("job-1");
        record.apply(&JobEvent::Start);
        assert_eq!(record.phase, JobPhase::Running);
    }

    #[test]
    fn executing_sets_current_node() {
        let mut record = JobRecord::new("job-1");
        record.apply(&JobEvent::Executing {
            node: Some("7".into()),
        });
        assert_eq!(record.current_node.as_deref(), Some("7"));
        assert_eq!(record.phase, JobPhase::Running);
    }

    #[test]
    fn executing_null_node_completes_without_error() {
        let mut record = JobRecord::new("job-1");
        record.apply(&JobEvent::Executing {
            node: Some("7".into()),
        });
        record.apply(&JobEvent::Executing { node: None });
        assert!(record.current_node.is_none());
        assert_eq!(record.phase, JobPhase::Completed);
    }

    #[test]
    fn executed_appends_output_and_clears_node() {
        let mut record = JobRecord::new("job-1");
        record.apply(&JobEvent::Executing {
            node: Some("9".into()),
        });
        record.apply(&JobEvent::Executed {
            node: "9".into(),
            output: serde_json::json!({"images": [{"filename": "out.png"}]}),
        });
        assert!(record.current_node.is_none());
        assert_eq!(record.outputs.len(), 1);
        assert_eq!(record.outputs[0].node, "9");
    }

    #[test]
    fn error_marks_failed_and_sticks() {
        let mut record = JobRecord::new("job-1");
        record.apply(&JobEvent::Error {
            node: "5".into(),
            kind: "RuntimeError".into(),
            message: "out of memory".into(),
        });
        assert_eq!(record.phase, JobPhase::Failed);

        // The trailing "nothing executing" event must not overwrite the
        // failure with a completion.
        record.apply(&JobEvent::Executing { node: None });
        assert_eq!(record.phase, JobPhase::Failed);
        let failure = record.failure.expect("failure should be recorded");
        assert_eq!(failure.message, "out of memory");
    }

    #[test]
    fn progress_updates_in_place() {
        let mut record = JobRecord::new("job-1");
        record.apply(&JobEvent::Progress { value: 3, max: 20 });
        record.apply(&JobEvent::Progress { value: 4, max: 20 });
        assert_eq!(record.progress, Some(Progress { value: 4, max: 20 }));
    }

    #[test]
    fn cached_nodes_accumulate() {
        let mut record = JobRecord::new("job-1");
        record.apply(&JobEvent::Cached {
            nodes: vec!["1".into(), "2".into()],
        });
        record.apply(&JobEvent::Cached {
            nodes: vec!["3".into()],
        });
        assert_eq!(record.cached_nodes, vec!["1", "2", "3"]);
    }
}
