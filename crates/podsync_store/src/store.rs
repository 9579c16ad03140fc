//! The store trait consumed by the sync engine.

use crate::error::StoreResult;
use crate::snapshot::{ActionLog, SubscriptionSnapshot};
use crate::state::CommitBatch;
use podsync_protocol::{ChangeKind, DataClass, LogicalTime, PendingChange, SyncCursor};

/// Durable local state, as the sync engine sees it.
///
/// Implementations must keep reads of committed state available while a
/// sync session is in flight: the engine merges into its own in-memory
/// buffer and touches the store only at `commit`.
pub trait StateStore: Send + Sync {
    /// Returns the last acknowledged cursor for a class, if any sync has
    /// ever completed.
    fn cursor(&self, class: DataClass) -> StoreResult<Option<SyncCursor>>;

    /// Returns the last-synced subscription snapshot.
    fn subscriptions(&self) -> StoreResult<SubscriptionSnapshot>;

    /// Returns the current user-facing subscription view (last-synced
    /// snapshot plus pending local changes replayed in order).
    fn current_subscriptions(&self) -> StoreResult<SubscriptionSnapshot>;

    /// Returns all episode actions known locally.
    fn actions(&self) -> StoreResult<ActionLog>;

    /// Returns the pending changes of a class, in logical-time order.
    fn pending(&self, class: DataClass) -> StoreResult<Vec<PendingChange>>;

    /// Returns the device's current logical time (the next tick the change
    /// log will assign). Survives truncation, so it never regresses.
    fn now(&self) -> StoreResult<LogicalTime>;

    /// Records a local mutation and returns the pending change created
    /// for it. This is the only way local edits enter the system.
    fn record_local(&self, kind: ChangeKind) -> StoreResult<PendingChange>;

    /// Durably applies the outcome of one sync round as a single atomic
    /// unit. A crash during commit must leave either the full new state
    /// or the full old state on disk, never a mixture.
    fn commit(&self, batch: CommitBatch) -> StoreResult<()>;

    /// Drops subscription tombstones. Administrative operation; see
    /// [`SubscriptionSnapshot::compact_tombstones`]. Returns the number
    /// of tombstones removed.
    fn compact_tombstones(&self) -> StoreResult<usize>;
}
