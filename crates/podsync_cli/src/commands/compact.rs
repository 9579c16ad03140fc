//! Compact command implementation.

use podsync_store::{FileStore, StateStore};
use std::path::Path;
use tracing::info;

/// Drops subscription tombstones.
///
/// Forgetting a tombstone means a device that has not yet synced the
/// removal will never see it, so this only runs on explicit request.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!("Compacting tombstones in {:?}", path);
    let store = FileStore::open(path)?;

    if dry_run {
        let view = store.subscriptions()?;
        let tombstones = view.len() - view.active_count();
        println!("{tombstones} tombstone(s) would be removed (dry run)");
        return Ok(());
    }

    let removed = store.compact_tombstones()?;
    if removed == 0 {
        println!("No tombstones to remove");
    } else {
        println!("Removed {removed} tombstone(s)");
    }
    Ok(())
}
