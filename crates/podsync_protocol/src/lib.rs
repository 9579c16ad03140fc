//! # podsync Protocol
//!
//! Data model and sync protocol types for podsync.
//!
//! This crate provides:
//! - `Subscription` and `EpisodeAction` records
//! - `ChangeLog` for tracking unacknowledged local mutations
//! - `SyncCursor` and the fetch/send wire messages
//! - The pure last-writer-wins conflict resolver
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod conflict;
mod device;
mod episode_action;
mod messages;
mod subscription;

pub use change::{ChangeKind, ChangeLog, DataClass, LogicalTime, PendingChange};
pub use conflict::{resolve_lww, ConflictNote, Winner};
pub use device::{DeviceId, DeviceType};
pub use episode_action::{ActionError, ActionKey, ActionKind, EpisodeAction, PlayPosition};
pub use messages::{
    ChangePayload, FetchRequest, FetchResponse, RegisterRequest, RegisterResponse,
    RemoteChangeKind, RemoteChanges, RemoteSubscriptionChange, SendRequest, SendResponse,
    SubscriptionDiff, SyncCursor,
};
pub use subscription::Subscription;
