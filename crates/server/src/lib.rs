//! Easel sync server library.
//!
//! Exposes the core building blocks (config, state, error handling,
//! routes, the backend resync handler) so integration tests and the
//! binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod response;
pub mod resync;
pub mod routes;
pub mod state;
