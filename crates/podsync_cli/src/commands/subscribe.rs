//! Subscribe / unsubscribe command implementation.

use podsync_protocol::ChangeKind;
use podsync_store::{FileStore, StateStore};
use std::path::Path;

/// Records a subscription change locally. It becomes visible immediately
/// and is transmitted on the next sync.
pub fn run(path: &Path, url: &str, subscribe: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(path)?;

    let already = store.current_subscriptions()?.is_subscribed(url);
    if subscribe && already {
        println!("Already subscribed to {url}");
        return Ok(());
    }
    if !subscribe && !already {
        println!("Not subscribed to {url}");
        return Ok(());
    }

    let kind = if subscribe {
        ChangeKind::Subscribe(url.to_string())
    } else {
        ChangeKind::Unsubscribe(url.to_string())
    };
    let change = store.record_local(kind)?;

    if subscribe {
        println!("Subscribed to {url} (pending as {})", change.seq);
    } else {
        println!("Unsubscribed from {url} (pending as {})", change.seq);
    }
    Ok(())
}
