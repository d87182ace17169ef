/// Backend-assigned identifier for one submitted job ("prompt").
/// Opaque to this layer; the submitter owns its format.
pub type JobId = String;

/// Identifier of a single node within a job's execution graph.
pub type NodeId = String;

/// Identifier of a downstream consumer session.
pub type SessionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
