//! List command implementation.

use podsync_store::{FileStore, StateStore};
use std::path::Path;

/// Prints the current subscription view: the last-synced snapshot with
/// pending local changes replayed on top.
pub fn run(path: &Path, all: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(path)?;
    let view = store.current_subscriptions()?;

    match format {
        "json" => {
            let entries: Vec<_> = view
                .iter()
                .filter(|s| all || s.is_active())
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        "text" => {
            let mut shown = 0;
            for sub in view.iter() {
                if sub.is_active() {
                    println!("  {}", sub.url);
                    shown += 1;
                } else if all {
                    println!("  {} (removed)", sub.url);
                    shown += 1;
                }
            }
            if shown == 0 {
                println!("No subscriptions");
            } else {
                println!();
                println!("{} active, {} total", view.active_count(), view.len());
            }
        }
        other => return Err(format!("unknown format '{other}' (text, json)").into()),
    }
    Ok(())
}
