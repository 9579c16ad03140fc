//! In-memory store, primarily for tests and embedding.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::{ActionLog, SubscriptionSnapshot};
use crate::state::{ClientState, CommitBatch};
use crate::store::StateStore;
use parking_lot::RwLock;
use podsync_protocol::{ChangeKind, DataClass, LogicalTime, PendingChange, SyncCursor};
use std::sync::atomic::{AtomicBool, Ordering};

/// A `StateStore` kept entirely in memory.
///
/// Supports failure injection so engine tests can exercise the
/// store-unavailable paths without a real disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<ClientState>,
    unavailable: AtomicBool,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with existing state.
    #[must_use]
    pub fn with_state(state: ClientState) -> Self {
        Self {
            state: RwLock::new(state),
            unavailable: AtomicBool::new(false),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Makes every operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes only the next `commit` call fail, leaving state untouched.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns a copy of the full state document, for inspection in tests.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state.read().clone()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked offline".into()))
        } else {
            Ok(())
        }
    }
}

impl StateStore for MemoryStore {
    fn cursor(&self, class: DataClass) -> StoreResult<Option<SyncCursor>> {
        self.check_available()?;
        Ok(self.state.read().cursors.get(&class).copied())
    }

    fn subscriptions(&self) -> StoreResult<SubscriptionSnapshot> {
        self.check_available()?;
        Ok(self.state.read().subscriptions.clone())
    }

    fn current_subscriptions(&self) -> StoreResult<SubscriptionSnapshot> {
        self.check_available()?;
        Ok(self.state.read().current_subscriptions())
    }

    fn actions(&self) -> StoreResult<ActionLog> {
        self.check_available()?;
        Ok(self.state.read().actions.clone())
    }

    fn pending(&self, class: DataClass) -> StoreResult<Vec<PendingChange>> {
        self.check_available()?;
        Ok(self.state.read().log.pending_vec(class))
    }

    fn record_local(&self, kind: ChangeKind) -> StoreResult<PendingChange> {
        self.check_available()?;
        Ok(self.state.write().record_local(kind))
    }

    fn now(&self) -> StoreResult<LogicalTime> {
        self.check_available()?;
        Ok(self.state.read().log.now())
    }

    fn commit(&self, batch: CommitBatch) -> StoreResult<()> {
        self.check_available()?;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        self.state.write().apply_commit(batch)
    }

    fn compact_tombstones(&self) -> StoreResult<usize> {
        self.check_available()?;
        Ok(self.state.write().subscriptions.compact_tombstones())
    }
}
