//! File-backed store with a staging-then-rename commit discipline.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::{ActionLog, SubscriptionSnapshot};
use crate::state::{ClientState, CommitBatch};
use crate::store::StateStore;
use parking_lot::RwLock;
use podsync_protocol::{ChangeKind, DataClass, LogicalTime, PendingChange, SyncCursor};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const STATE_FILE: &str = "state.json";
const STAGED_FILE: &str = "state.json.staged";

/// A `StateStore` persisted as a single JSON document.
///
/// # Durability
///
/// Every mutation writes the full document to a staging file, syncs it,
/// then renames it over the live file. The rename is the commit point:
/// a crash before it leaves the old document intact, a crash after it
/// leaves the new one. On open, a leftover staging file is either
/// promoted (it parsed cleanly, so the write completed) or discarded
/// (torn write), so an interrupted commit is always resolved one way or
/// the other before the engine runs.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    state: RwLock<ClientState>,
}

impl FileStore {
    /// Opens or creates a store in the given directory, running crash
    /// recovery first.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Self::recover(&dir)?;

        let state_path = dir.join(STATE_FILE);
        let state = if state_path.exists() {
            let bytes = fs::read(&state_path)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", state_path.display())))?
        } else {
            ClientState::new()
        };

        debug!(dir = %dir.display(), "opened file store");
        Ok(Self {
            dir,
            state: RwLock::new(state),
        })
    }

    /// Returns the directory this store persists into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn recover(dir: &Path) -> StoreResult<()> {
        let staged = dir.join(STAGED_FILE);
        if !staged.exists() {
            return Ok(());
        }

        let bytes = fs::read(&staged)?;
        match serde_json::from_slice::<ClientState>(&bytes) {
            Ok(_) => {
                // Fully written but not renamed: complete the commit.
                fs::rename(&staged, dir.join(STATE_FILE))?;
                info!(dir = %dir.display(), "completed interrupted commit from staging file");
            }
            Err(e) => {
                // Torn write: discard and fall back to the previous state.
                fs::remove_file(&staged)?;
                warn!(dir = %dir.display(), error = %e, "discarded torn staging file");
            }
        }
        Ok(())
    }

    fn persist(&self, state: &ClientState) -> StoreResult<()> {
        let staged = self.dir.join(STAGED_FILE);
        let body = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Corrupt(format!("encoding state: {e}")))?;

        let mut file = File::create(&staged)?;
        file.write_all(&body)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staged, self.dir.join(STATE_FILE))?;
        Ok(())
    }

    /// Persists then publishes a mutation to the in-memory state.
    fn mutate<T>(&self, f: impl FnOnce(&mut ClientState) -> StoreResult<T>) -> StoreResult<T> {
        let mut state = self.state.write();
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        self.persist(&draft)?;
        *state = draft;
        Ok(out)
    }
}

impl StateStore for FileStore {
    fn cursor(&self, class: DataClass) -> StoreResult<Option<SyncCursor>> {
        Ok(self.state.read().cursors.get(&class).copied())
    }

    fn subscriptions(&self) -> StoreResult<SubscriptionSnapshot> {
        Ok(self.state.read().subscriptions.clone())
    }

    fn current_subscriptions(&self) -> StoreResult<SubscriptionSnapshot> {
        Ok(self.state.read().current_subscriptions())
    }

    fn actions(&self) -> StoreResult<ActionLog> {
        Ok(self.state.read().actions.clone())
    }

    fn pending(&self, class: DataClass) -> StoreResult<Vec<PendingChange>> {
        Ok(self.state.read().log.pending_vec(class))
    }

    fn record_local(&self, kind: ChangeKind) -> StoreResult<PendingChange> {
        self.mutate(|state| Ok(state.record_local(kind)))
    }

    fn now(&self) -> StoreResult<LogicalTime> {
        Ok(self.state.read().log.now())
    }

    fn commit(&self, batch: CommitBatch) -> StoreResult<()> {
        self.mutate(|state| state.apply_commit(batch))
    }

    fn compact_tombstones(&self) -> StoreResult<usize> {
        self.mutate(|state| Ok(state.subscriptions.compact_tombstones()))
    }
}
