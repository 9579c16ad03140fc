//! Episode action records.

use crate::change::LogicalTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors constructing an episode action.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActionError {
    /// A play position was supplied for a non-play action.
    #[error("play position is only valid for '{}' actions", ActionKind::Play)]
    PositionOnNonPlay,
}

/// The kind of an episode action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Episode was marked as new.
    New,
    /// Episode was downloaded.
    Download,
    /// Episode was played.
    Play,
    /// Episode was deleted from the device.
    Delete,
}

impl ActionKind {
    /// Returns the wire name of the action kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::New => "new",
            ActionKind::Download => "download",
            ActionKind::Play => "play",
            ActionKind::Delete => "delete",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ActionKind::New),
            "download" => Some(ActionKind::Download),
            "play" => Some(ActionKind::Play),
            "delete" => Some(ActionKind::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Play position within an episode, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayPosition {
    /// Position playback started from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<u64>,
    /// Position playback stopped at.
    pub position: u64,
    /// Total episode duration, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl PlayPosition {
    /// Creates a play position with only a stop position.
    #[must_use]
    pub fn at(position: u64) -> Self {
        Self {
            started: None,
            position,
            total: None,
        }
    }

    /// Creates a fully specified play position.
    #[must_use]
    pub fn range(started: u64, position: u64, total: u64) -> Self {
        Self {
            started: Some(started),
            position,
            total: Some(total),
        }
    }
}

/// One playback/download event.
///
/// Actions are facts, not mutable records: they are never edited, only
/// appended. Identity is (episode URL, kind, timestamp), so merging two
/// devices' action logs is a plain set union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeAction {
    /// Feed URL of the podcast.
    pub podcast: String,
    /// Enclosure URL or GUID of the episode.
    pub episode: String,
    /// What happened.
    pub kind: ActionKind,
    /// When it happened.
    pub timestamp: LogicalTime,
    /// Play position, only present for [`ActionKind::Play`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PlayPosition>,
}

/// The identity of an episode action, used for merge deduplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    /// Episode URL.
    pub episode: String,
    /// Action kind.
    pub kind: ActionKind,
    /// Timestamp.
    pub timestamp: LogicalTime,
}

impl EpisodeAction {
    /// Creates an action without a play position.
    #[must_use]
    pub fn new(
        podcast: impl Into<String>,
        episode: impl Into<String>,
        kind: ActionKind,
        timestamp: LogicalTime,
    ) -> Self {
        Self {
            podcast: podcast.into(),
            episode: episode.into(),
            kind,
            timestamp,
            position: None,
        }
    }

    /// Creates a play action with a position.
    pub fn play(
        podcast: impl Into<String>,
        episode: impl Into<String>,
        timestamp: LogicalTime,
        position: PlayPosition,
    ) -> Self {
        Self {
            podcast: podcast.into(),
            episode: episode.into(),
            kind: ActionKind::Play,
            timestamp,
            position: Some(position),
        }
    }

    /// Creates an action, validating that a position only accompanies play.
    pub fn with_position(
        podcast: impl Into<String>,
        episode: impl Into<String>,
        kind: ActionKind,
        timestamp: LogicalTime,
        position: Option<PlayPosition>,
    ) -> Result<Self, ActionError> {
        if position.is_some() && kind != ActionKind::Play {
            return Err(ActionError::PositionOnNonPlay);
        }
        Ok(Self {
            podcast: podcast.into(),
            episode: episode.into(),
            kind,
            timestamp,
            position,
        })
    }

    /// Returns the identity key of this action.
    #[must_use]
    pub fn key(&self) -> ActionKey {
        ActionKey {
            episode: self.episode.clone(),
            kind: self.kind,
            timestamp: self.timestamp,
        }
    }
}
