//! Consumer-facing WebSocket gateway.
//!
//! Manages sessions for downstream UI consumers: the outbound message
//! protocol, per-session queues gated on the readiness handshake, the
//! socket handler, the relay that fans bridge events out to every
//! session, and the ask/answer exchange for questions a running
//! workflow puts to its consumer.

pub mod ask;
pub mod handler;
pub mod heartbeat;
pub mod manager;
pub mod messages;
pub mod relay;
pub mod session;

pub use ask::{AskError, AskRegistry};
pub use handler::handle_socket;
pub use heartbeat::start_heartbeat;
pub use manager::SessionManager;
pub use messages::{ConsumerMessage, OutboundMessage};
pub use relay::start_relay;
