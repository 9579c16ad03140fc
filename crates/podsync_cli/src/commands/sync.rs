//! Sync command implementation.

use podsync_engine::{HttpTransport, SyncConfig, SyncEngine};
use podsync_protocol::{DeviceId, DeviceType};
use podsync_server::{LoopbackServer, RemoteService};
use podsync_store::FileStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const DEMO_FEEDS: &[&str] = &[
    "https://feeds.example.org/history-weekly.xml",
    "https://feeds.example.org/rust-audio.xml",
];

/// Runs one sync round.
///
/// Demo mode spins up an in-process remote seeded with a couple of feeds,
/// so the whole round (fetch, merge, send, commit) can be exercised
/// without network configuration.
pub fn run(path: &Path, device: &str, demo: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !demo {
        return Err("no remote configured; run with --demo for an in-process remote".into());
    }

    let service = Arc::new(RemoteService::new());
    for feed in DEMO_FEEDS {
        service.seed_subscription(*feed, true);
    }

    info!("Syncing state at {:?} as device '{}'", path, device);
    let store = Arc::new(FileStore::open(path)?);
    let config = SyncConfig::new(DeviceId::new(device), "loopback://demo")
        .with_device_type(DeviceType::Desktop);
    let transport = Arc::new(
        HttpTransport::new(LoopbackServer::new(Arc::clone(&service)))
            .with_timeout(config.timeout),
    );
    let engine = SyncEngine::new(config, transport, store);
    engine.register()?;

    println!("Syncing against the demo remote as '{device}'...");
    let report = engine.sync_with_retry()?;

    if report.is_noop() {
        println!("Already up to date");
    } else {
        println!("  {} feed(s) added, {} removed", report.added, report.removed);
        println!(
            "  {} action(s) pulled, {} pushed",
            report.actions_pulled, report.actions_pushed
        );
        for conflict in &report.conflicts {
            println!(
                "  conflict on {} resolved for {:?}",
                conflict.url, conflict.winner
            );
        }
    }

    println!();
    println!("Remote now has {} subscription(s)", service.subscribed().len());
    Ok(())
}
