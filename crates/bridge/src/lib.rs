//! Resilient WebSocket bridge to the compute backend.
//!
//! Provides typed event parsing for the backend's control protocol,
//! binary preview-frame decoding, the event router that keeps local job
//! records in sync with the execution stream, and the connection driver
//! that reconnects with backoff and resynchronizes after every connect.

pub mod client;
pub mod connection;
pub mod events;
pub mod frames;
pub mod log;
pub mod messages;
pub mod pending;
pub mod reconnect;
pub mod router;

pub use connection::{Bridge, BridgeError, ConnectionState, ResyncError, ResyncHandler};
pub use events::BridgeEvent;
pub use frames::{PreviewArtifact, PreviewKind, PreviewSlot};
pub use reconnect::ReconnectConfig;
pub use router::EventRouter;
