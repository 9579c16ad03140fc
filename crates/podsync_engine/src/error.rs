//! Error types for the sync engine.

use podsync_protocol::SyncCursor;
use podsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or service unavailability.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote rejected a send because the expected cursor was stale.
    /// Under the single-writer model this indicates a protocol or
    /// concurrency violation, not a transient fault; it is never retried.
    #[error("stale cursor: remote advanced past expected {expected}")]
    StaleCursor {
        /// The cursor the client sent as its expectation.
        expected: SyncCursor,
    },

    /// Malformed or unexpected message from the remote.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local persistence failure. Fatal to the round, never swallowed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A sync session is already running for this data class.
    #[error("sync already in progress for this data class")]
    AlreadyInProgress,

    /// The caller cancelled the session while the network was in flight.
    #[error("sync cancelled")]
    Cancelled,

    /// A network step exceeded its configured timeout.
    #[error("operation timed out")]
    Timeout,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::AlreadyInProgress.is_retryable());
        assert!(!SyncError::StaleCursor {
            expected: SyncCursor::new(4)
        }
        .is_retryable());
    }

    #[test]
    fn store_errors_convert() {
        let err: SyncError = StoreError::Unavailable("disk offline".into()).into();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("disk offline"));
    }
}
