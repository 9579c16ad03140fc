//! # podsync Store
//!
//! Durable local state for podsync.
//!
//! This crate provides:
//! - `SubscriptionSnapshot` and `ActionLog`, the committed local state
//! - `ClientState`, the single document holding snapshot, change log,
//!   and per-class cursors
//! - The `StateStore` trait with in-memory and file-backed backends
//!
//! ## Key Invariants
//!
//! - The commit of one sync round (snapshot, change-log truncation,
//!   cursor advance) is applied as one atomic unit
//! - Cursors never regress
//! - Reads always serve the last committed state; an in-flight sync
//!   session never blocks them

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod snapshot;
mod state;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use snapshot::{ActionLog, SubscriptionSnapshot};
pub use state::{ClientState, CommitBatch, CommitPayload};
pub use store::StateStore;
