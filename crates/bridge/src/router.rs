//! Backend event routing.
//!
//! [`EventRouter`] turns the decoded event stream into job-record
//! updates. Each connection owns one router; its state is exactly the
//! state that does not survive a reconnect (the active-job pointer and
//! the pending buffer) plus the globals the backend reports through
//! `status` broadcasts.

use tokio::sync::broadcast;

use easel_core::types::JobId;
use easel_core::{JobEvent, JobStore};

use crate::events::BridgeEvent;
use crate::messages::BackendEvent;
use crate::pending::{PendingBuffer, PendingLimits};

/// Per-connection routing state machine.
///
/// `progress` events carry no job id on the wire. The backend only
/// interleaves events for one executing job at a time, so the router
/// tracks the job named by the most recent job-scoped event and charges
/// progress to it.
#[derive(Debug, Default)]
pub struct EventRouter {
    /// Job named by the most recent job-scoped event, if any.
    active: Option<JobId>,
    /// Session id the backend assigned on its first status broadcast.
    session_id: Option<String>,
    /// Queue depth from the most recent status broadcast.
    queue_remaining: Option<i32>,
    pending: PendingBuffer,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: PendingLimits) -> Self {
        Self {
            pending: PendingBuffer::with_limits(limits),
            ..Self::default()
        }
    }

    pub fn active_job(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn queue_remaining(&self) -> Option<i32> {
        self.queue_remaining
    }

    /// Number of jobs currently waiting for their record.
    pub fn pending_jobs(&self) -> usize {
        self.pending.job_count()
    }

    /// Route one decoded backend event.
    ///
    /// Job-scoped events go to the record when one exists, into the
    /// pending buffer when it does not. A [`BridgeEvent`] is broadcast
    /// at arrival time either way; the later replay into a late record
    /// does not broadcast again.
    pub fn handle(
        &mut self,
        event: BackendEvent,
        store: &mut impl JobStore,
        events: &broadcast::Sender<BridgeEvent>,
    ) {
        match event {
            BackendEvent::Status(data) => {
                if let Some(sid) = data.sid {
                    tracing::debug!(sid = %sid, "Backend assigned session id");
                    self.session_id = Some(sid);
                }
                let queue_remaining = data.status.exec_info.queue_remaining;
                self.queue_remaining = Some(queue_remaining);
                tracing::debug!(queue_remaining, "Backend queue status");
                let _ = events.send(BridgeEvent::BackendStatus { queue_remaining });
            }

            BackendEvent::ExecutionStart(data) => {
                tracing::info!(job_id = %data.prompt_id, "Execution started");
                self.route_job_event(&data.prompt_id, JobEvent::Start, store);
                let _ = events.send(BridgeEvent::JobStarted {
                    job_id: data.prompt_id,
                });
            }

            BackendEvent::ExecutionCached(data) => {
                tracing::debug!(
                    job_id = %data.prompt_id,
                    cached = data.nodes.len(),
                    "Nodes served from cache",
                );
                self.route_job_event(
                    &data.prompt_id,
                    JobEvent::Cached {
                        nodes: data.nodes.clone(),
                    },
                    store,
                );
                let _ = events.send(BridgeEvent::JobCached {
                    job_id: data.prompt_id,
                    nodes: data.nodes,
                });
            }

            BackendEvent::Executing(data) => match data.node {
                Some(node) => {
                    tracing::debug!(job_id = %data.prompt_id, node = %node, "Executing node");
                    self.route_job_event(
                        &data.prompt_id,
                        JobEvent::Executing {
                            node: Some(node.clone()),
                        },
                        store,
                    );
                    let _ = events.send(BridgeEvent::NodeExecuting {
                        job_id: data.prompt_id,
                        node,
                    });
                }
                // A null node reference means nothing is executing any
                // more: the job finished.
                None => {
                    tracing::info!(job_id = %data.prompt_id, "Execution completed");
                    self.route_job_event(&data.prompt_id, JobEvent::Executing { node: None }, store);
                    let _ = events.send(BridgeEvent::JobCompleted {
                        job_id: data.prompt_id,
                    });
                }
            },

            BackendEvent::Executed(data) => {
                tracing::debug!(job_id = %data.prompt_id, node = %data.node, "Node produced output");
                self.route_job_event(
                    &data.prompt_id,
                    JobEvent::Executed {
                        node: data.node.clone(),
                        output: data.output.clone(),
                    },
                    store,
                );
                let _ = events.send(BridgeEvent::NodeOutput {
                    job_id: data.prompt_id,
                    node: data.node,
                    output: data.output,
                });
            }

            BackendEvent::ExecutionError(data) => {
                tracing::error!(
                    job_id = %data.prompt_id,
                    node_id = %data.node_id,
                    error_type = %data.exception_type,
                    error_message = %data.exception_message,
                    "Execution error",
                );
                self.route_job_event(
                    &data.prompt_id,
                    JobEvent::Error {
                        node: data.node_id.clone(),
                        kind: data.exception_type.clone(),
                        message: data.exception_message.clone(),
                    },
                    store,
                );
                let _ = events.send(BridgeEvent::JobFailed {
                    job_id: data.prompt_id,
                    node: data.node_id,
                    kind: data.exception_type,
                    message: data.exception_message,
                });
            }

            BackendEvent::Progress(data) => {
                let Some(job_id) = self.active.clone() else {
                    // Nothing to charge this to. Documented loss: the
                    // event is unattributable without a pointer.
                    tracing::debug!(
                        value = data.value,
                        max = data.max,
                        "Progress event with no active job, discarding",
                    );
                    return;
                };
                self.deliver(
                    &job_id,
                    JobEvent::Progress {
                        value: data.value,
                        max: data.max,
                    },
                    store,
                );
                let _ = events.send(BridgeEvent::JobProgress {
                    job_id,
                    value: data.value,
                    max: data.max,
                });
            }
        }
    }

    /// Replay everything buffered for a job whose record now exists.
    ///
    /// Called by the submitter after it registers the record. Returns
    /// the number of replayed events. Replay applies events to the
    /// record only; they were already broadcast at arrival time.
    pub fn job_created(&mut self, job_id: &str, store: &mut impl JobStore) -> usize {
        let events = self.pending.drain(job_id);
        let replayed = events.len();

        match store.lookup(job_id) {
            Some(record) => {
                for event in &events {
                    record.apply(event);
                }
                if replayed > 0 {
                    tracing::info!(job_id, replayed, "Replayed buffered events into new record");
                }
                replayed
            }
            None => {
                // Creation is announced after the record is registered,
                // so a miss is a caller bug. Keep the events rather
                // than lose them.
                tracing::warn!(job_id, count = replayed, "job_created without a record");
                for event in events {
                    self.pending.append(job_id, event);
                }
                0
            }
        }
    }

    /// Forget connection-scoped state.
    ///
    /// Called when a new connection opens. The backend does not carry
    /// jobs across a restart, so the pointer and any buffered events
    /// from the previous connection are stale.
    pub fn reset(&mut self) {
        self.active = None;
        let dropped = self.pending.clear();
        if dropped > 0 {
            tracing::info!(dropped, "Discarded buffered events from previous connection");
        }
    }

    /// Set the pointer, then hand the event to the record or the
    /// pending buffer.
    fn route_job_event(&mut self, job_id: &str, event: JobEvent, store: &mut impl JobStore) {
        self.active = Some(job_id.to_owned());
        self.deliver(job_id, event, store);
    }

    /// Record dispatch without touching the active pointer.
    fn deliver(&mut self, job_id: &str, event: JobEvent, store: &mut impl JobStore) {
        match store.lookup(job_id) {
            Some(record) => record.apply(&event),
            None => self.pending.append(job_id, event),
        }
    }
}
