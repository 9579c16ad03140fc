//! In-memory reference implementation of the podsync remote service.
//!
//! Holds one user's server-side state: a timestamped subscription change
//! stream (cursors are stream positions) and an idempotent episode action
//! log. Used by the engine's integration tests and the CLI's demo mode;
//! it is deliberately not a production server.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod http;
mod service;

pub use http::LoopbackServer;
pub use service::{RemoteService, ServiceError, ServiceResult};
