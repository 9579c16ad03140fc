//! Committed local state: subscription snapshot and action log.

use podsync_protocol::{
    ActionKey, ChangeKind, EpisodeAction, LogicalTime, PendingChange, Subscription,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The set of known subscriptions, tombstones included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    entries: BTreeMap<String, Subscription>,
}

impl SubscriptionSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a feed subscribed, reviving a tombstone if present.
    pub fn subscribe(&mut self, url: &str, at: LogicalTime) {
        match self.entries.get_mut(url) {
            Some(sub) => {
                if !sub.is_active() {
                    sub.revive(at);
                }
            }
            None => {
                self.entries
                    .insert(url.to_string(), Subscription::new(url, at));
            }
        }
    }

    /// Marks a feed unsubscribed, leaving a tombstone.
    ///
    /// An unknown URL still gets a tombstone entry so the removal can
    /// propagate to devices that do know the feed.
    pub fn unsubscribe(&mut self, url: &str, at: LogicalTime) {
        match self.entries.get_mut(url) {
            Some(sub) => {
                if sub.is_active() {
                    sub.remove(at);
                }
            }
            None => {
                let mut sub = Subscription::new(url, at);
                sub.remove(at);
                self.entries.insert(url.to_string(), sub);
            }
        }
    }

    /// Returns true if the feed is actively subscribed.
    #[must_use]
    pub fn is_subscribed(&self, url: &str) -> bool {
        self.entries.get(url).is_some_and(Subscription::is_active)
    }

    /// Iterates over active subscriptions in URL order.
    pub fn subscribed(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values().filter(|s| s.is_active())
    }

    /// Iterates over all entries, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values()
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.subscribed().count()
    }

    /// Returns the number of entries, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replays one local change onto the snapshot.
    ///
    /// Episode actions are not part of this snapshot and are ignored.
    pub fn apply(&mut self, change: &PendingChange) {
        match &change.kind {
            ChangeKind::Subscribe(url) => self.subscribe(url, change.seq),
            ChangeKind::Unsubscribe(url) => self.unsubscribe(url, change.seq),
            ChangeKind::Action(_) => {}
        }
    }

    /// Drops all tombstones.
    ///
    /// Compaction permanently forgets remove events, so it runs only on
    /// explicit administrative instruction, never automatically: a lagging
    /// device that has not yet observed a tombstone would otherwise never
    /// see the removal.
    pub fn compact_tombstones(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, sub| sub.is_active());
        before - self.entries.len()
    }
}

/// The append-only log of episode actions known to this device.
///
/// Actions are commutative, order-independent facts; merging two logs is
/// set union keyed on (episode, kind, timestamp).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    actions: BTreeMap<ActionKey, EpisodeAction>,
}

impl ActionLog {
    /// Creates an empty action log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an action. Returns false if it was already present.
    pub fn insert(&mut self, action: EpisodeAction) -> bool {
        self.actions.insert(action.key(), action).is_none()
    }

    /// Unions a batch of actions into the log. Returns how many were new.
    pub fn merge<I: IntoIterator<Item = EpisodeAction>>(&mut self, actions: I) -> usize {
        actions.into_iter().filter(|a| self.insert(a.clone())).count()
    }

    /// Returns true if the action identity is present.
    #[must_use]
    pub fn contains(&self, key: &ActionKey) -> bool {
        self.actions.contains_key(key)
    }

    /// Iterates over actions in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &EpisodeAction> {
        self.actions.values()
    }

    /// Returns the number of recorded actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no actions are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
