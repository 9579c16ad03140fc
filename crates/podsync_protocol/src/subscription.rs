//! Subscription records.

use crate::change::LogicalTime;
use serde::{Deserialize, Serialize};

/// A podcast feed the user follows.
///
/// Removal is a tombstone, not a deletion: the record stays so that the
/// remove event can still propagate to lagging devices. Tombstones are
/// compacted only on explicit administrative instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Feed URL. This is the identity of the subscription.
    pub url: String,
    /// When the subscription was (last) added.
    pub added_at: LogicalTime,
    /// Tombstone: when the subscription was removed, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<LogicalTime>,
}

impl Subscription {
    /// Creates an active subscription.
    #[must_use]
    pub fn new(url: impl Into<String>, added_at: LogicalTime) -> Self {
        Self {
            url: url.into(),
            added_at,
            removed_at: None,
        }
    }

    /// Returns true if the subscription is active (not tombstoned).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }

    /// Marks the subscription removed at the given time.
    pub fn remove(&mut self, at: LogicalTime) {
        self.removed_at = Some(at);
    }

    /// Revives a tombstoned subscription.
    pub fn revive(&mut self, at: LogicalTime) {
        self.added_at = at;
        self.removed_at = None;
    }
}
