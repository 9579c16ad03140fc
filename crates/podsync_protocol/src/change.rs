//! Local change log and logical clock.

use crate::episode_action::EpisodeAction;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A monotonically increasing local logical timestamp.
///
/// Logical time orders local events deterministically and is independent
/// of the wall clock, so clock skew between devices cannot invert the
/// order of a device's own edits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LogicalTime(u64);

impl LogicalTime {
    /// Creates a logical time from a raw counter value.
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the next tick.
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// The two independently synchronized classes of data.
///
/// Each class has its own cursor and its own single-writer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    /// Podcast feed subscriptions (add/remove with tombstones).
    Subscriptions,
    /// Per-episode playback/download action records (append-only facts).
    EpisodeActions,
}

impl DataClass {
    /// All data classes, in the order a full sync processes them.
    pub const ALL: [DataClass; 2] = [DataClass::Subscriptions, DataClass::EpisodeActions];

    /// Returns the wire name of the class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::Subscriptions => "subscriptions",
            DataClass::EpisodeActions => "episode_actions",
        }
    }
}

impl fmt::Display for DataClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The user subscribed to a feed URL.
    Subscribe(String),
    /// The user unsubscribed from a feed URL.
    Unsubscribe(String),
    /// The user performed an episode action.
    Action(EpisodeAction),
}

impl ChangeKind {
    /// Returns the data class this change belongs to.
    #[must_use]
    pub fn data_class(&self) -> DataClass {
        match self {
            ChangeKind::Subscribe(_) | ChangeKind::Unsubscribe(_) => DataClass::Subscriptions,
            ChangeKind::Action(_) => DataClass::EpisodeActions,
        }
    }

    /// Returns the feed URL for subscription changes.
    #[must_use]
    pub fn subscription_url(&self) -> Option<&str> {
        match self {
            ChangeKind::Subscribe(url) | ChangeKind::Unsubscribe(url) => Some(url),
            ChangeKind::Action(_) => None,
        }
    }
}

/// An uncommitted local mutation awaiting transmission.
///
/// A pending change is created at the moment of local mutation and
/// destroyed only when the remote has acknowledged the prefix containing
/// it (or a merge resolved it away, with a recorded conflict note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Logical timestamp assigned at append time.
    pub seq: LogicalTime,
    /// The mutation itself.
    pub kind: ChangeKind,
}

impl PendingChange {
    /// Returns the data class this change belongs to.
    #[must_use]
    pub fn data_class(&self) -> DataClass {
        self.kind.data_class()
    }
}

/// An append-only log of local mutations since the last successful sync.
///
/// # Invariants
///
/// - Entries are totally ordered by logical time; `append` assigns the
///   next tick.
/// - Replaying the pending entries of a class, in order, onto the
///   last-synced snapshot reproduces the current local state exactly.
/// - `truncate` is only ever called after remote acknowledgment of
///   exactly that prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeLog {
    entries: VecDeque<PendingChange>,
    next_seq: LogicalTime,
}

impl ChangeLog {
    /// Creates an empty change log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current logical clock value (the next tick to assign).
    #[must_use]
    pub fn now(&self) -> LogicalTime {
        self.next_seq
    }

    /// Appends a change, assigning it the next logical timestamp.
    pub fn append(&mut self, kind: ChangeKind) -> PendingChange {
        let change = PendingChange {
            seq: self.next_seq,
            kind,
        };
        self.next_seq = self.next_seq.next();
        self.entries.push_back(change.clone());
        change
    }

    /// Returns the pending changes of a class, in logical-time order.
    pub fn pending(&self, class: DataClass) -> impl Iterator<Item = &PendingChange> {
        self.entries.iter().filter(move |c| c.data_class() == class)
    }

    /// Returns the pending changes of a class as an owned vector.
    #[must_use]
    pub fn pending_vec(&self, class: DataClass) -> Vec<PendingChange> {
        self.pending(class).cloned().collect()
    }

    /// Returns the number of pending changes of a class.
    #[must_use]
    pub fn pending_count(&self, class: DataClass) -> usize {
        self.pending(class).count()
    }

    /// Removes acknowledged changes of a class up to and including the
    /// given logical time.
    pub fn truncate(&mut self, class: DataClass, up_to: LogicalTime) {
        self.entries
            .retain(|c| c.data_class() != class || c.seq > up_to);
    }

    /// Removes a specific entry, identified by its logical time.
    ///
    /// Used when a merge discards a pending change that lost a conflict.
    pub fn remove(&mut self, seq: LogicalTime) {
        self.entries.retain(|c| c.seq != seq);
    }

    /// Returns the total number of entries across all classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode_action::{ActionKind, EpisodeAction};

    fn action(episode: &str, at: u64) -> EpisodeAction {
        EpisodeAction::new(
            "https://feeds.example.org/a.xml",
            episode,
            ActionKind::Download,
            LogicalTime::new(at),
        )
    }

    #[test]
    fn append_assigns_increasing_seq() {
        let mut log = ChangeLog::new();

        let a = log.append(ChangeKind::Subscribe("https://a.example/feed".into()));
        let b = log.append(ChangeKind::Unsubscribe("https://a.example/feed".into()));
        let c = log.append(ChangeKind::Action(action("e1", 3)));

        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
        assert_eq!(log.now(), c.seq.next());
    }

    #[test]
    fn pending_filters_by_class() {
        let mut log = ChangeLog::new();
        log.append(ChangeKind::Subscribe("https://a.example/feed".into()));
        log.append(ChangeKind::Action(action("e1", 1)));
        log.append(ChangeKind::Subscribe("https://b.example/feed".into()));

        assert_eq!(log.pending_count(DataClass::Subscriptions), 2);
        assert_eq!(log.pending_count(DataClass::EpisodeActions), 1);
    }

    #[test]
    fn truncate_only_touches_the_given_class() {
        let mut log = ChangeLog::new();
        let s = log.append(ChangeKind::Subscribe("https://a.example/feed".into()));
        log.append(ChangeKind::Action(action("e1", 1)));
        log.append(ChangeKind::Subscribe("https://b.example/feed".into()));

        log.truncate(DataClass::Subscriptions, s.seq);

        assert_eq!(log.pending_count(DataClass::Subscriptions), 1);
        assert_eq!(log.pending_count(DataClass::EpisodeActions), 1);
    }

    #[test]
    fn truncate_is_a_prefix_operation() {
        let mut log = ChangeLog::new();
        log.append(ChangeKind::Subscribe("https://a.example/feed".into()));
        let b = log.append(ChangeKind::Subscribe("https://b.example/feed".into()));
        let c = log.append(ChangeKind::Subscribe("https://c.example/feed".into()));

        log.truncate(DataClass::Subscriptions, b.seq);

        let left: Vec<_> = log.pending_vec(DataClass::Subscriptions);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].seq, c.seq);
    }

    #[test]
    fn remove_single_entry() {
        let mut log = ChangeLog::new();
        let a = log.append(ChangeKind::Subscribe("https://a.example/feed".into()));
        let b = log.append(ChangeKind::Subscribe("https://b.example/feed".into()));

        log.remove(a.seq);

        let left = log.pending_vec(DataClass::Subscriptions);
        assert_eq!(left, vec![b]);
    }

    #[test]
    fn clock_survives_truncation() {
        let mut log = ChangeLog::new();
        let a = log.append(ChangeKind::Subscribe("https://a.example/feed".into()));
        log.truncate(DataClass::Subscriptions, a.seq);

        let b = log.append(ChangeKind::Subscribe("https://b.example/feed".into()));
        assert!(b.seq > a.seq);
    }
}
