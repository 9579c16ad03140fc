//! Sync cursor and wire messages.

use crate::change::{DataClass, LogicalTime};
use crate::device::{DeviceId, DeviceType};
use crate::episode_action::EpisodeAction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An opaque progress token issued by the remote service.
///
/// # Invariant
///
/// Cursors are monotonically non-decreasing across successful syncs; a
/// cursor is advanced only after its payload has been durably merged into
/// local state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SyncCursor(u64);

impl SyncCursor {
    /// Wraps a raw token value. Only the remote service mints these.
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor:{}", self.0)
    }
}

/// Direction of a remote subscription change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteChangeKind {
    /// The feed is subscribed as of this change.
    Subscribed,
    /// The feed is unsubscribed as of this change.
    Unsubscribed,
}

/// One subscription change reported by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSubscriptionChange {
    /// Feed URL.
    pub url: String,
    /// Direction of the change.
    pub kind: RemoteChangeKind,
    /// When the remote recorded the change.
    pub timestamp: LogicalTime,
}

impl RemoteSubscriptionChange {
    /// A remote "now subscribed" change.
    #[must_use]
    pub fn subscribed(url: impl Into<String>, timestamp: LogicalTime) -> Self {
        Self {
            url: url.into(),
            kind: RemoteChangeKind::Subscribed,
            timestamp,
        }
    }

    /// A remote "now unsubscribed" change.
    #[must_use]
    pub fn unsubscribed(url: impl Into<String>, timestamp: LogicalTime) -> Self {
        Self {
            url: url.into(),
            kind: RemoteChangeKind::Unsubscribed,
            timestamp,
        }
    }
}

/// Changes fetched from the remote since a cursor, per data class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteChanges {
    /// Subscription changes, in remote order.
    Subscriptions(Vec<RemoteSubscriptionChange>),
    /// Episode actions, in remote order.
    EpisodeActions(Vec<EpisodeAction>),
}

impl RemoteChanges {
    /// Returns the data class these changes belong to.
    #[must_use]
    pub fn data_class(&self) -> DataClass {
        match self {
            RemoteChanges::Subscriptions(_) => DataClass::Subscriptions,
            RemoteChanges::EpisodeActions(_) => DataClass::EpisodeActions,
        }
    }

    /// Returns the number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RemoteChanges::Subscriptions(c) => c.len(),
            RemoteChanges::EpisodeActions(a) => a.len(),
        }
    }

    /// Returns true if there are no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The minimal add/remove list sent upstream for subscriptions.
///
/// Collapsed from the pending change log: payload size is bounded by the
/// number of distinct URLs touched, never by event count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscriptionDiff {
    /// Feed URLs to add.
    pub add: BTreeSet<String>,
    /// Feed URLs to remove.
    pub remove: BTreeSet<String>,
}

impl SubscriptionDiff {
    /// Returns true if the diff carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Returns the number of URLs touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.add.len() + self.remove.len()
    }
}

/// The outgoing payload of one send, per data class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePayload {
    /// Collapsed subscription add/remove lists.
    Subscriptions(SubscriptionDiff),
    /// Episode actions in timestamp order. Never collapsed: every action
    /// is a discrete fact and the remote log is append-only.
    EpisodeActions(Vec<EpisodeAction>),
}

impl ChangePayload {
    /// Returns the data class of the payload.
    #[must_use]
    pub fn data_class(&self) -> DataClass {
        match self {
            ChangePayload::Subscriptions(_) => DataClass::Subscriptions,
            ChangePayload::EpisodeActions(_) => DataClass::EpisodeActions,
        }
    }

    /// Returns true if there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            ChangePayload::Subscriptions(diff) => diff.is_empty(),
            ChangePayload::EpisodeActions(actions) => actions.is_empty(),
        }
    }
}

/// Device-registration request body, announcing a device and its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Registering device.
    pub device: DeviceId,
    /// The kind of device, for display on the service.
    pub device_type: DeviceType,
}

/// Device-registration response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Total number of devices the account now knows.
    pub devices: u64,
}

/// Fetch-changes request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Requesting device.
    pub device: DeviceId,
    /// Data class to fetch.
    pub class: DataClass,
    /// Cursor of the last acknowledged sync, if any.
    pub since: Option<SyncCursor>,
}

/// Fetch-changes response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Changes since the requested cursor, in remote order.
    pub changes: RemoteChanges,
    /// Candidate cursor covering the returned changes.
    pub new_cursor: SyncCursor,
}

/// Send-changes request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Sending device.
    pub device: DeviceId,
    /// Data class being sent.
    pub class: DataClass,
    /// The outgoing payload.
    pub payload: ChangePayload,
    /// Cursor the client believes is current; stale means a protocol or
    /// concurrency violation on the client side.
    pub expected_cursor: SyncCursor,
}

/// Send-changes response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Acknowledgment cursor after the payload was applied.
    pub ack_cursor: Option<SyncCursor>,
    /// True if `expected_cursor` was stale.
    pub stale_cursor: bool,
    /// Error message if the send was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResponse {
    /// A successful acknowledgment.
    #[must_use]
    pub fn ack(cursor: SyncCursor) -> Self {
        Self {
            ack_cursor: Some(cursor),
            stale_cursor: false,
            error: None,
        }
    }

    /// A stale-cursor rejection.
    #[must_use]
    pub fn stale() -> Self {
        Self {
            ack_cursor: None,
            stale_cursor: true,
            error: Some("expected cursor is stale".into()),
        }
    }

    /// A rejection with a message.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ack_cursor: None,
            stale_cursor: false,
            error: Some(message.into()),
        }
    }
}
