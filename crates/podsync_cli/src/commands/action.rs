//! Action command implementation.

use podsync_protocol::{ActionKind, ChangeKind, EpisodeAction, PlayPosition};
use podsync_store::{FileStore, StateStore};
use std::path::Path;

/// Records an episode action locally.
pub fn run(
    path: &Path,
    podcast: &str,
    episode: &str,
    kind: &str,
    position: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind = ActionKind::parse(kind)
        .ok_or_else(|| format!("unknown action kind '{kind}' (new, download, play, delete)"))?;

    let store = FileStore::open(path)?;
    let at = store.now()?;
    let action =
        EpisodeAction::with_position(podcast, episode, kind, at, position.map(PlayPosition::at))?;
    store.record_local(ChangeKind::Action(action))?;

    println!("Recorded {kind} for {episode} at {at}");
    Ok(())
}
