//! Buffer for events that outran their job record.
//!
//! The backend starts streaming lifecycle events the moment a job is
//! accepted, which is routinely before the submitter has registered the
//! local record. Events for unknown jobs wait here, keyed by job id,
//! until the record shows up.

use std::collections::HashMap;

use easel_core::types::JobId;
use easel_core::{JobEvent, ReplayQueue};

/// Caps on buffered state.
///
/// The wire protocol puts no bound on how long a job can stay
/// unregistered, so without caps a job that never materializes would
/// leak its events forever.
#[derive(Debug, Clone, Copy)]
pub struct PendingLimits {
    /// Maximum number of distinct jobs with buffered events. Exceeding
    /// it evicts the job that has waited longest.
    pub max_jobs: usize,
    /// Maximum buffered events per job. Excess events are dropped.
    pub max_events_per_job: usize,
}

impl Default for PendingLimits {
    fn default() -> Self {
        Self {
            max_jobs: 32,
            max_events_per_job: 256,
        }
    }
}

/// Ordered multi-map of job id to not-yet-deliverable events.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    limits: PendingLimits,
    /// Job ids in slot-creation order, oldest first. Drives eviction.
    order: Vec<JobId>,
    slots: HashMap<JobId, ReplayQueue<JobEvent>>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: PendingLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Buffer one event for a job with no record yet.
    pub fn append(&mut self, job_id: &str, event: JobEvent) {
        if let Some(slot) = self.slots.get_mut(job_id) {
            if slot.len() >= self.limits.max_events_per_job {
                tracing::warn!(
                    job_id,
                    limit = self.limits.max_events_per_job,
                    "Pending slot full, dropping event",
                );
                return;
            }
            // Slots are flushed only when removed, so push always buffers.
            let _ = slot.push(event);
            return;
        }

        if self.slots.len() >= self.limits.max_jobs {
            let evicted = self.order.remove(0);
            let lost = self.slots.remove(&evicted).map(|s| s.len()).unwrap_or(0);
            tracing::warn!(
                evicted_job = %evicted,
                lost_events = lost,
                limit = self.limits.max_jobs,
                "Pending buffer full, evicting oldest job slot",
            );
        }

        let mut slot = ReplayQueue::new();
        let _ = slot.push(event);
        self.order.push(job_id.to_owned());
        self.slots.insert(job_id.to_owned(), slot);
    }

    /// Remove and return everything buffered for `job_id`, in arrival
    /// order. Empty if nothing was buffered.
    pub fn drain(&mut self, job_id: &str) -> Vec<JobEvent> {
        match self.slots.remove(job_id) {
            Some(mut slot) => {
                self.order.retain(|id| id != job_id);
                slot.flush()
            }
            None => Vec::new(),
        }
    }

    /// Drop everything. Returns how many events were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.slots.values().map(ReplayQueue::len).sum();
        self.slots.clear();
        self.order.clear();
        dropped
    }

    /// Number of jobs with buffered events.
    pub fn job_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of events buffered for one job.
    pub fn buffered_for(&self, job_id: &str) -> usize {
        self.slots.get(job_id).map(ReplayQueue::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
