//! The client state document and atomic commit batch.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::{ActionLog, SubscriptionSnapshot};
use podsync_protocol::{ChangeKind, ChangeLog, DataClass, LogicalTime, PendingChange, SyncCursor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the client persists, as one document.
///
/// Keeping snapshot, change log, and cursors in a single document is what
/// lets a backend commit a sync round atomically: the three writes of the
/// COMMITTING step become one document swap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientState {
    /// Last-synced subscription snapshot.
    pub subscriptions: SubscriptionSnapshot,
    /// All episode actions known locally (local facts and merged remote
    /// facts; the union is idempotent, so there is no separate base set).
    pub actions: ActionLog,
    /// Local mutations not yet acknowledged by the remote.
    pub log: ChangeLog,
    /// Last acknowledged cursor per data class.
    pub cursors: BTreeMap<DataClass, SyncCursor>,
}

impl ClientState {
    /// Creates an empty state document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current user-facing subscription view: the last-synced
    /// snapshot with pending local changes replayed on top, in order.
    #[must_use]
    pub fn current_subscriptions(&self) -> SubscriptionSnapshot {
        let mut view = self.subscriptions.clone();
        for change in self.log.pending(DataClass::Subscriptions) {
            view.apply(change);
        }
        view
    }

    /// Records a local mutation: appends it to the change log and, for
    /// episode actions, into the action log.
    pub fn record_local(&mut self, kind: ChangeKind) -> PendingChange {
        let change = self.log.append(kind);
        if let ChangeKind::Action(action) = &change.kind {
            self.actions.insert(action.clone());
        }
        change
    }

    /// Applies a commit batch, enforcing cursor monotonicity.
    pub fn apply_commit(&mut self, batch: CommitBatch) -> StoreResult<()> {
        if let Some(&current) = self.cursors.get(&batch.class) {
            if batch.cursor < current {
                return Err(StoreError::CursorRegression {
                    current,
                    attempted: batch.cursor,
                });
            }
        }

        match batch.payload {
            CommitPayload::Subscriptions(snapshot) => self.subscriptions = snapshot,
            // Actions are append-only facts: the merged log from the
            // session unions into the live log, so an action recorded
            // while the session was in flight is never erased.
            CommitPayload::EpisodeActions(merged) => {
                self.actions.merge(merged.iter().cloned());
            }
        }

        for seq in batch.discard {
            self.log.remove(seq);
        }
        if let Some(up_to) = batch.truncate_up_to {
            self.log.truncate(batch.class, up_to);
        }
        self.cursors.insert(batch.class, batch.cursor);
        Ok(())
    }
}

/// The merged state of one data class, ready to commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommitPayload {
    /// Replacement subscription snapshot.
    Subscriptions(SubscriptionSnapshot),
    /// Merged action log, unioned into the live log on commit.
    EpisodeActions(ActionLog),
}

/// The outcome of one sync round for one data class, applied as a single
/// logically atomic unit: snapshot swap, change-log truncation, and cursor
/// advance together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBatch {
    /// The data class this commit settles.
    pub class: DataClass,
    /// The merged state to install.
    pub payload: CommitPayload,
    /// Acknowledged change-log prefix to drop, if any.
    pub truncate_up_to: Option<LogicalTime>,
    /// Individual pending changes discarded by conflict resolution.
    pub discard: Vec<LogicalTime>,
    /// The new cursor. Must be >= the persisted cursor for the class.
    pub cursor: SyncCursor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use podsync_protocol::{ActionKind, EpisodeAction};

    const FEED: &str = "https://feeds.example.org/a.xml";

    #[test]
    fn current_view_replays_pending() {
        let mut state = ClientState::new();
        state.record_local(ChangeKind::Subscribe(FEED.into()));

        assert!(state.current_subscriptions().is_subscribed(FEED));
        // The committed base is untouched until a commit lands.
        assert!(!state.subscriptions.is_subscribed(FEED));
    }

    #[test]
    fn replay_reproduces_state_for_any_interleaving() {
        let mut state = ClientState::new();
        state.record_local(ChangeKind::Subscribe(FEED.into()));
        state.record_local(ChangeKind::Unsubscribe(FEED.into()));
        state.record_local(ChangeKind::Subscribe("https://b.example/feed".into()));
        state.record_local(ChangeKind::Subscribe(FEED.into()));

        let view = state.current_subscriptions();
        assert!(view.is_subscribed(FEED));
        assert!(view.is_subscribed("https://b.example/feed"));

        // Replaying the same pending list again yields the same view.
        assert_eq!(view, state.current_subscriptions());
    }

    #[test]
    fn commit_applies_all_three_writes() {
        let mut state = ClientState::new();
        let change = state.record_local(ChangeKind::Subscribe(FEED.into()));

        let mut merged = state.current_subscriptions();
        merged.subscribe("https://other-device.example/feed", LogicalTime::new(99));

        state
            .apply_commit(CommitBatch {
                class: DataClass::Subscriptions,
                payload: CommitPayload::Subscriptions(merged),
                truncate_up_to: Some(change.seq),
                discard: Vec::new(),
                cursor: SyncCursor::new(7),
            })
            .unwrap();

        assert!(state.subscriptions.is_subscribed(FEED));
        assert_eq!(state.log.pending_count(DataClass::Subscriptions), 0);
        assert_eq!(
            state.cursors.get(&DataClass::Subscriptions),
            Some(&SyncCursor::new(7))
        );
    }

    #[test]
    fn commit_rejects_cursor_regression() {
        let mut state = ClientState::new();
        state.cursors.insert(DataClass::Subscriptions, SyncCursor::new(9));

        let result = state.apply_commit(CommitBatch {
            class: DataClass::Subscriptions,
            payload: CommitPayload::Subscriptions(SubscriptionSnapshot::new()),
            truncate_up_to: None,
            discard: Vec::new(),
            cursor: SyncCursor::new(3),
        });

        assert!(matches!(result, Err(StoreError::CursorRegression { .. })));
        // Nothing may change on a rejected commit.
        assert_eq!(
            state.cursors.get(&DataClass::Subscriptions),
            Some(&SyncCursor::new(9))
        );
    }

    #[test]
    fn action_commit_keeps_actions_recorded_meanwhile() {
        let mut state = ClientState::new();
        let synced = EpisodeAction::new(FEED, "e1", ActionKind::Download, LogicalTime::new(1));
        let change = state.record_local(ChangeKind::Action(synced.clone()));

        // The sync session snapshots the log here, then a play lands
        // before its commit does.
        let merged = state.actions.clone();
        let late = EpisodeAction::new(FEED, "e2", ActionKind::Play, LogicalTime::new(2));
        state.record_local(ChangeKind::Action(late.clone()));

        state
            .apply_commit(CommitBatch {
                class: DataClass::EpisodeActions,
                payload: CommitPayload::EpisodeActions(merged),
                truncate_up_to: Some(change.seq),
                discard: Vec::new(),
                cursor: SyncCursor::new(1),
            })
            .unwrap();

        assert!(state.actions.contains(&synced.key()));
        assert!(state.actions.contains(&late.key()));
        // The late action is still pending for the next round.
        assert_eq!(state.log.pending_count(DataClass::EpisodeActions), 1);
    }

    #[test]
    fn commit_discards_conflict_losers() {
        let mut state = ClientState::new();
        let lost = state.record_local(ChangeKind::Unsubscribe(FEED.into()));
        let kept = state.record_local(ChangeKind::Subscribe("https://b.example/feed".into()));

        state
            .apply_commit(CommitBatch {
                class: DataClass::Subscriptions,
                payload: CommitPayload::Subscriptions(SubscriptionSnapshot::new()),
                truncate_up_to: None,
                discard: vec![lost.seq],
                cursor: SyncCursor::new(1),
            })
            .unwrap();

        let pending = state.log.pending_vec(DataClass::Subscriptions);
        assert_eq!(pending, vec![kept]);
    }
}
