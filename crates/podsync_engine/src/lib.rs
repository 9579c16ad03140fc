//! Incremental sync engine for podcast subscriptions and episode actions.
//!
//! The engine orchestrates one sync round per data class through a fixed
//! sequence: fetch remote changes since the last cursor, merge them with
//! the local pending log (last-writer-wins on contradictions), send the
//! collapsed local diff, and commit the outcome atomically through the
//! store. Cursors only advance after a durable commit, so every round is
//! resumable and re-running a round is harmless.
//!
//! ```
//! use podsync_engine::{MockTransport, SyncConfig, SyncEngine};
//! use podsync_protocol::{DataClass, DeviceId, FetchResponse, RemoteChanges, SyncCursor};
//! use podsync_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let transport = MockTransport::new();
//! transport.push_fetch(
//!     DataClass::Subscriptions,
//!     FetchResponse {
//!         changes: RemoteChanges::Subscriptions(Vec::new()),
//!         new_cursor: SyncCursor::new(1),
//!     },
//! );
//! transport.push_fetch(
//!     DataClass::EpisodeActions,
//!     FetchResponse {
//!         changes: RemoteChanges::EpisodeActions(Vec::new()),
//!         new_cursor: SyncCursor::new(1),
//!     },
//! );
//!
//! let config = SyncConfig::new(DeviceId::new("laptop-1"), "mock://sync");
//! let engine = SyncEngine::new(config, Arc::new(transport), Arc::new(MemoryStore::new()));
//! let report = engine.sync().unwrap();
//! assert!(report.is_noop());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod diff;
mod error;
mod http;
mod merge;
mod session;
mod transport;

pub use config::{RetryConfig, SyncConfig};
pub use diff::{action_diff, subscription_diff};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport};
pub use merge::{merge_subscriptions, SubscriptionMerge};
pub use session::{SessionState, SyncEngine, SyncReport, SyncStats};
pub use transport::{MockTransport, SentPayload, SyncTransport};
