//! The sync session state machine.

use crate::config::SyncConfig;
use crate::diff::{action_diff, subscription_diff};
use crate::error::{SyncError, SyncResult};
use crate::merge::merge_subscriptions;
use crate::transport::SyncTransport;
use parking_lot::{Mutex, RwLock};
use podsync_protocol::{
    ActionKind, ChangeKind, ChangePayload, ConflictNote, DataClass, EpisodeAction, FetchResponse,
    LogicalTime, PendingChange, PlayPosition, RemoteChanges,
};
use podsync_store::{
    ActionLog, CommitBatch, CommitPayload, StateStore, StoreError, SubscriptionSnapshot,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Where a sync session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session running.
    Idle,
    /// Fetching remote changes.
    Fetching,
    /// Merging remote changes with local state.
    Merging,
    /// Sending local changes upstream.
    Sending,
    /// Durably committing the round.
    Committing,
    /// The last session ended in an error.
    Failed,
}

/// What one completed sync accomplished.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Feeds newly subscribed by remote changes.
    pub added: usize,
    /// Feeds newly unsubscribed by remote changes.
    pub removed: usize,
    /// Episode actions newly learned from the remote.
    pub actions_pulled: usize,
    /// Episode actions transmitted upstream.
    pub actions_pushed: usize,
    /// Conflicts resolved during the merge, whichever side won.
    pub conflicts: Vec<ConflictNote>,
}

impl SyncReport {
    /// Returns true if the sync moved no data in either direction.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added == 0
            && self.removed == 0
            && self.actions_pulled == 0
            && self.actions_pushed == 0
            && self.conflicts.is_empty()
    }

    fn absorb(&mut self, other: SyncReport) {
        self.added += other.added;
        self.removed += other.removed;
        self.actions_pulled += other.actions_pulled;
        self.actions_pushed += other.actions_pushed;
        self.conflicts.extend(other.conflicts);
    }
}

/// Cumulative counters across the engine's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStats {
    /// Sync rounds that committed (or were clean no-ops).
    pub sessions_completed: u64,
    /// Sync rounds that ended in an error.
    pub sessions_failed: u64,
    /// Conflicts resolved, summed over all rounds.
    pub conflicts_resolved: u64,
    /// Refetch loops taken after ambiguous send failures.
    pub refetches: u64,
}

/// The incremental sync engine for one device.
///
/// The engine is a pure orchestrator: it owns no durable state of its own.
/// Each data class syncs independently with its own cursor, and at most
/// one session per class runs at a time. Local reads and writes through
/// the store remain available for the whole session; the store is touched
/// only at commit.
pub struct SyncEngine<T: SyncTransport, S: StateStore> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<S>,
    class_locks: [Mutex<()>; 2],
    state: RwLock<SessionState>,
    cancelled: AtomicBool,
    stats: RwLock<SyncStats>,
}

impl<T: SyncTransport, S: StateStore> SyncEngine<T, S> {
    /// Creates an engine over a transport and a store.
    pub fn new(config: SyncConfig, transport: Arc<T>, store: Arc<S>) -> Self {
        Self {
            config,
            transport,
            store,
            class_locks: [Mutex::new(()), Mutex::new(())],
            state: RwLock::new(SessionState::Idle),
            cancelled: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns where the current (or last) session is.
    pub fn session_state(&self) -> SessionState {
        *self.state.read()
    }

    /// Returns lifetime counters.
    pub fn stats(&self) -> SyncStats {
        *self.stats.read()
    }

    /// Requests cancellation of the running session.
    ///
    /// Takes effect at the next network-step boundary; a session already
    /// committing finishes the commit.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Announces this device and its configured kind to the remote
    /// service. Idempotent; typically called once before the first sync.
    pub fn register(&self) -> SyncResult<()> {
        self.transport
            .register_device(&self.config.device, self.config.device_type)
    }

    /// Records a local subscribe. Visible immediately, synced later.
    pub fn subscribe(&self, url: impl Into<String>) -> SyncResult<()> {
        self.store.record_local(ChangeKind::Subscribe(url.into()))?;
        Ok(())
    }

    /// Records a local unsubscribe. Visible immediately, synced later.
    pub fn unsubscribe(&self, url: impl Into<String>) -> SyncResult<()> {
        self.store
            .record_local(ChangeKind::Unsubscribe(url.into()))?;
        Ok(())
    }

    /// Records an episode action.
    pub fn record_action(&self, action: EpisodeAction) -> SyncResult<()> {
        self.store.record_local(ChangeKind::Action(action))?;
        Ok(())
    }

    /// Records a play action with a position, stamped with the store's
    /// current logical clock.
    pub fn record_play(
        &self,
        podcast: impl Into<String>,
        episode: impl Into<String>,
        position: PlayPosition,
    ) -> SyncResult<()> {
        let at = self.store.now()?;
        self.record_action(EpisodeAction::play(podcast, episode, at, position))
    }

    /// Records an action of any kind, stamped with the store's current
    /// logical clock. Positions are rejected on non-play actions.
    pub fn record_action_now(
        &self,
        podcast: impl Into<String>,
        episode: impl Into<String>,
        kind: ActionKind,
        position: Option<PlayPosition>,
    ) -> SyncResult<()> {
        let at = self.store.now()?;
        let action = EpisodeAction::with_position(podcast, episode, kind, at, position)
            .map_err(|e| SyncError::Protocol(e.to_string()))?;
        self.record_action(action)
    }

    /// Returns the current user-facing subscription view.
    pub fn subscriptions(&self) -> SyncResult<SubscriptionSnapshot> {
        Ok(self.store.current_subscriptions()?)
    }

    /// Returns all episode actions known locally.
    pub fn actions(&self) -> SyncResult<ActionLog> {
        Ok(self.store.actions()?)
    }

    /// Runs one full sync: both data classes, subscriptions first.
    ///
    /// Running with nothing to do and nothing new on the remote commits
    /// nothing and changes nothing; a sync is safe at any time.
    pub fn sync(&self) -> SyncResult<SyncReport> {
        self.cancelled.store(false, Ordering::SeqCst);
        let mut report = SyncReport::default();
        for class in DataClass::ALL {
            match self.sync_class(class) {
                Ok(class_report) => report.absorb(class_report),
                Err(err) => {
                    self.stats.write().sessions_failed += 1;
                    *self.state.write() = SessionState::Failed;
                    return Err(err);
                }
            }
        }
        let mut stats = self.stats.write();
        stats.sessions_completed += 1;
        stats.conflicts_resolved += report.conflicts.len() as u64;
        drop(stats);
        *self.state.write() = SessionState::Idle;
        info!(
            added = report.added,
            removed = report.removed,
            pulled = report.actions_pulled,
            pushed = report.actions_pushed,
            conflicts = report.conflicts.len(),
            "sync completed"
        );
        Ok(report)
    }

    /// Runs [`Self::sync`], retrying transient failures with backoff.
    pub fn sync_with_retry(&self) -> SyncResult<SyncReport> {
        let mut attempt = 0;
        loop {
            match self.sync() {
                Ok(report) => return Ok(report),
                Err(err) if err.is_retryable() && attempt + 1 < self.config.retry.max_attempts => {
                    attempt += 1;
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(attempt, ?delay, error = %err, "sync failed, retrying");
                    thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Syncs one data class through the full fetch/merge/send/commit round.
    fn sync_class(&self, class: DataClass) -> SyncResult<SyncReport> {
        let Some(_guard) = self.class_locks[class_index(class)].try_lock() else {
            return Err(SyncError::AlreadyInProgress);
        };

        let since = self.store.cursor(class)?;
        let mut refetches_left = self.config.refetch_budget;

        loop {
            self.enter(SessionState::Fetching)?;
            let fetched = self
                .transport
                .fetch_changes(&self.config.device, class, since)?;
            debug!(%class, count = fetched.changes.len(), cursor = %fetched.new_cursor, "fetched remote changes");

            *self.state.write() = SessionState::Merging;
            let round = match class {
                DataClass::Subscriptions => self.merge_and_diff_subscriptions(&fetched)?,
                DataClass::EpisodeActions => self.merge_and_diff_actions(&fetched)?,
            };

            let cursor = if round.payload.is_empty() {
                // Nothing to send; the fetch cursor covers the round. On a
                // refetch pass this is how an already-applied send resolves.
                fetched.new_cursor
            } else {
                self.enter(SessionState::Sending)?;
                match self.transport.send_changes(
                    &self.config.device,
                    class,
                    &round.payload,
                    fetched.new_cursor,
                ) {
                    Ok(ack) => ack,
                    Err(err) if err.is_retryable() && refetches_left > 0 => {
                        // The send may or may not have been applied. Re-fetch
                        // from the old cursor: if it was, the recomputed diff
                        // comes back empty and the round commits without a
                        // resend.
                        refetches_left -= 1;
                        self.stats.write().refetches += 1;
                        warn!(%class, error = %err, refetches_left, "ambiguous send, refetching");
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            };

            if round.is_noop() && since.is_some_and(|s| cursor <= s) {
                debug!(%class, "nothing to sync");
                return Ok(round.report);
            }

            *self.state.write() = SessionState::Committing;
            self.commit_with_retry(CommitBatch {
                class,
                payload: round.commit,
                truncate_up_to: round.truncate_up_to,
                discard: round.discard,
                cursor,
            })?;
            info!(%class, %cursor, "committed sync round");
            return Ok(round.report);
        }
    }

    /// Merges fetched subscription changes and computes the outgoing diff.
    fn merge_and_diff_subscriptions(&self, fetched: &FetchResponse) -> SyncResult<ClassRound> {
        let RemoteChanges::Subscriptions(remote) = &fetched.changes else {
            return Err(SyncError::Protocol(format!(
                "expected subscription changes, got {}",
                fetched.changes.data_class()
            )));
        };

        let base = self.store.subscriptions()?;
        let pending = self.store.pending(DataClass::Subscriptions)?;
        let merge = merge_subscriptions(&base, remote, &pending);
        let diff = subscription_diff(&merge.retained, &merge.snapshot);

        // The committed snapshot reflects everything acknowledged: the
        // merged remote view plus the retained changes that just went out.
        let mut committed = merge.snapshot.clone();
        for change in &merge.retained {
            committed.apply(change);
        }

        Ok(ClassRound {
            report: SyncReport {
                added: merge.added,
                removed: merge.removed,
                actions_pulled: 0,
                actions_pushed: 0,
                conflicts: merge.conflicts,
            },
            payload: ChangePayload::Subscriptions(diff),
            commit: CommitPayload::Subscriptions(committed),
            truncate_up_to: max_seq(&merge.retained),
            discard: merge.discarded,
        })
    }

    /// Unions fetched episode actions and collects the outgoing batch.
    fn merge_and_diff_actions(&self, fetched: &FetchResponse) -> SyncResult<ClassRound> {
        let RemoteChanges::EpisodeActions(remote) = &fetched.changes else {
            return Err(SyncError::Protocol(format!(
                "expected episode actions, got {}",
                fetched.changes.data_class()
            )));
        };

        let mut actions = self.store.actions()?;
        let pulled = actions.merge(remote.iter().cloned());

        let pending = self.store.pending(DataClass::EpisodeActions)?;
        let outgoing = action_diff(&pending);
        let pushed = outgoing.len();

        Ok(ClassRound {
            report: SyncReport {
                added: 0,
                removed: 0,
                actions_pulled: pulled,
                actions_pushed: pushed,
                conflicts: Vec::new(),
            },
            payload: ChangePayload::EpisodeActions(outgoing),
            commit: CommitPayload::EpisodeActions(actions),
            truncate_up_to: max_seq(&pending),
            discard: Vec::new(),
        })
    }

    /// Commits a batch, retrying transient store failures with the same
    /// batch. A cursor regression is a logic error and fails immediately.
    fn commit_with_retry(&self, batch: CommitBatch) -> SyncResult<()> {
        let mut attempt = 0;
        loop {
            match self.store.commit(batch.clone()) {
                Ok(()) => return Ok(()),
                Err(err @ StoreError::CursorRegression { .. }) => return Err(err.into()),
                Err(err) if attempt + 1 < self.config.retry.max_attempts => {
                    attempt += 1;
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    warn!(attempt, ?delay, error = %err, "commit failed, retrying");
                    thread::sleep(delay);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Moves into a network-facing state, honoring cancellation.
    fn enter(&self, next: SessionState) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            *self.state.write() = SessionState::Failed;
            return Err(SyncError::Cancelled);
        }
        *self.state.write() = next;
        Ok(())
    }
}

/// Everything one class round produces before committing.
struct ClassRound {
    report: SyncReport,
    payload: ChangePayload,
    commit: CommitPayload,
    truncate_up_to: Option<LogicalTime>,
    discard: Vec<LogicalTime>,
}

impl ClassRound {
    fn is_noop(&self) -> bool {
        self.report.is_noop() && self.truncate_up_to.is_none() && self.discard.is_empty()
    }
}

fn class_index(class: DataClass) -> usize {
    match class {
        DataClass::Subscriptions => 0,
        DataClass::EpisodeActions => 1,
    }
}

fn max_seq(pending: &[PendingChange]) -> Option<LogicalTime> {
    pending.iter().map(|c| c.seq).max()
}
