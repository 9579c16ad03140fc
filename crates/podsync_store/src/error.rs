//! Error types for the store.

use podsync_protocol::SyncCursor;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the local store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying persistence cannot be reached. Fatal to the sync round,
    /// never silently ignored.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O failure while reading or writing state.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted state document could not be decoded.
    #[error("corrupt state document: {0}")]
    Corrupt(String),

    /// A commit attempted to move a cursor backwards.
    #[error("cursor regression: {current} -> {attempted}")]
    CursorRegression {
        /// Cursor currently persisted.
        current: SyncCursor,
        /// Cursor the commit attempted to write.
        attempted: SyncCursor,
    },
}
