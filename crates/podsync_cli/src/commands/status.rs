//! Status command implementation.

use podsync_protocol::DataClass;
use podsync_store::{FileStore, StateStore};
use std::path::Path;

/// Prints cursors, pending change counts, and action log size.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(path)?;

    println!("Client state at {:?}", path);
    println!();
    for class in DataClass::ALL {
        let cursor = store.cursor(class)?;
        let pending = store.pending(class)?.len();
        let cursor_text = cursor.map_or_else(|| "never synced".to_string(), |c| c.to_string());
        println!("  {class:<16} {cursor_text:<16} {pending} pending");
    }
    println!();

    let view = store.current_subscriptions()?;
    let actions = store.actions()?;
    println!("  {} active subscriptions ({} total entries)", view.active_count(), view.len());
    println!("  {} episode actions recorded", actions.len());
    Ok(())
}
