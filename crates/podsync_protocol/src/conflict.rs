//! Conflict records and the last-writer-wins resolver.

use crate::change::LogicalTime;
use serde::{Deserialize, Serialize};

/// Which side of a conflict won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// The local pending change wins and stays queued for transmission.
    Local,
    /// The remote change wins; the local pending change is discarded.
    Remote,
}

/// Resolves a subscription conflict by logical-time comparison.
///
/// The remote service exposes no per-record version vector, so last-writer-
/// wins over logical time is the strongest policy the protocol supports.
/// The local side wins only when it is strictly newer than the remote
/// change it merges against; ties go to the remote, which is authoritative
/// for state as of the returned cursor.
///
/// Pure and free of I/O so it can be property-tested exhaustively.
#[must_use]
pub fn resolve_lww(local: LogicalTime, remote: LogicalTime) -> Winner {
    if local > remote {
        Winner::Local
    } else {
        Winner::Remote
    }
}

/// A record of a merge-level conflict.
///
/// Conflicts are expected steady-state events in a multi-device system.
/// They are recorded for observability, never raised as errors, and a
/// losing local change is never dropped without one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictNote {
    /// The feed URL both sides touched.
    pub url: String,
    /// Logical time of the local pending change.
    pub local_seq: LogicalTime,
    /// Time of the remote change it merged against.
    pub remote_time: LogicalTime,
    /// Which side won.
    pub winner: Winner,
}

impl ConflictNote {
    /// Records the outcome of resolving one contradiction.
    #[must_use]
    pub fn new(url: impl Into<String>, local_seq: LogicalTime, remote_time: LogicalTime) -> Self {
        Self {
            url: url.into(),
            local_seq,
            remote_time,
            winner: resolve_lww(local_seq, remote_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn newer_local_wins() {
        assert_eq!(
            resolve_lww(LogicalTime::new(9), LogicalTime::new(7)),
            Winner::Local
        );
    }

    #[test]
    fn older_local_loses() {
        assert_eq!(
            resolve_lww(LogicalTime::new(5), LogicalTime::new(7)),
            Winner::Remote
        );
    }

    #[test]
    fn tie_goes_to_remote() {
        assert_eq!(
            resolve_lww(LogicalTime::new(7), LogicalTime::new(7)),
            Winner::Remote
        );
    }

    #[test]
    fn note_records_the_resolution() {
        let note = ConflictNote::new(
            "https://feeds.example.org/x.xml",
            LogicalTime::new(5),
            LogicalTime::new(7),
        );
        assert_eq!(note.winner, Winner::Remote);
        assert_eq!(note.local_seq, LogicalTime::new(5));
        assert_eq!(note.remote_time, LogicalTime::new(7));
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic_and_total(local in 0u64..u64::MAX, remote in 0u64..u64::MAX) {
            let l = LogicalTime::new(local);
            let r = LogicalTime::new(remote);
            let first = resolve_lww(l, r);
            prop_assert_eq!(first, resolve_lww(l, r));
            // Exactly one side wins, keyed on strict ordering.
            prop_assert_eq!(first == Winner::Local, local > remote);
        }
    }
}
