//! In-memory job store.
//!
//! The synchronization layer only ever needs to answer "is there a
//! record for this job id, and give me a mutable handle to it". The
//! [`JobStore`] trait is that seam; [`MemoryJobStore`] is the only
//! implementation this service ships.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::job::JobRecord;
use crate::types::JobId;

/// Lookup seam the event router mutates records through.
pub trait JobStore {
    /// Mutable handle to the record for `job_id`, if one exists.
    fn lookup(&mut self, job_id: &str) -> Option<&mut JobRecord>;
}

/// Hash-map backed store of job records.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: HashMap<JobId, JobRecord>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record under its id.
    ///
    /// Ids come from the backend and are unique per submission, so a
    /// second insert for the same id is a caller bug and is rejected.
    pub fn insert(&mut self, record: JobRecord) -> Result<(), CoreError> {
        if self.jobs.contains_key(&record.id) {
            return Err(CoreError::Conflict(format!(
                "job {} already registered",
                record.id
            )));
        }
        self.jobs.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.jobs.get(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for MemoryJobStore {
    fn lookup(&mut self, job_id: &str) -> Option<&mut JobRecord> {
        self.jobs.get_mut(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobEvent, JobPhase};

    #[test]
    fn insert_then_lookup() {
        let mut store = MemoryJobStore::new();
        store.insert(JobRecord::new("job-1")).unwrap();

        let record = store.lookup("job-1").expect("record should exist");
        record.apply(&JobEvent::Start);
        assert_eq!(store.get("job-1").unwrap().phase, JobPhase::Running);
    }

    #[test]
    fn lookup_unknown_id_is_none() {
        let mut store = MemoryJobStore::new();
        assert!(store.lookup("nope").is_none());
    }

    #[test]
    fn duplicate_insert_is_conflict() {
        let mut store = MemoryJobStore::new();
        store.insert(JobRecord::new("job-1")).unwrap();
        let err = store.insert(JobRecord::new("job-1")).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }
}
