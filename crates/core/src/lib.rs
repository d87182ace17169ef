//! Shared vocabulary for the Easel synchronization layer.
//!
//! Contains the plain types every other crate builds on: id aliases,
//! the domain error type, job records and the job-scoped events that
//! mutate them, the in-memory job store, and the generic ready-gated
//! replay queue used by both buffering layers.

pub mod error;
pub mod job;
pub mod replay;
pub mod store;
pub mod types;

pub use error::CoreError;
pub use job::{ExecutionFailure, JobEvent, JobPhase, JobRecord, NodeOutput, Progress};
pub use replay::ReplayQueue;
pub use store::{JobStore, MemoryJobStore};
