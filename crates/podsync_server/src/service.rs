//! The reference remote: one user's server-side sync state.

use parking_lot::Mutex;
use podsync_protocol::{
    ActionKey, ChangePayload, DataClass, DeviceId, DeviceType, EpisodeAction, FetchResponse,
    LogicalTime, RemoteChangeKind, RemoteChanges, RemoteSubscriptionChange, SyncCursor,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

/// Errors a send can produce.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServiceError {
    /// The expected cursor is behind the stream head.
    #[error("expected cursor {expected} is stale, head is {head}")]
    StaleCursor {
        /// What the client expected.
        expected: SyncCursor,
        /// The current stream head.
        head: SyncCursor,
    },
    /// The payload's class does not match the endpoint.
    #[error("payload class mismatch: {0}")]
    ClassMismatch(String),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Default)]
struct UserState {
    /// Change stream for subscriptions; the cursor is a stream position.
    subscription_stream: Vec<RemoteSubscriptionChange>,
    /// Currently subscribed feed URLs, derived from the stream.
    subscribed: BTreeSet<String>,
    /// Action stream, in arrival order.
    action_stream: Vec<EpisodeAction>,
    /// Identity index over the action stream for idempotent ingestion.
    action_keys: BTreeSet<ActionKey>,
    /// Devices that have registered or talked to us.
    devices: BTreeMap<DeviceId, DeviceRecord>,
    /// Server logical clock, stamped onto minted subscription changes.
    clock: LogicalTime,
}

#[derive(Clone, Copy)]
struct DeviceRecord {
    device_type: DeviceType,
    last_seen: LogicalTime,
}

/// An in-memory sync service for a single user account.
///
/// Subscription state is global to the user, with a timestamped change
/// stream; a cursor is a position in that stream, so fetching since a
/// cursor replays exactly the changes the device has not seen. Episode
/// actions ingest idempotently by identity, which makes re-sending a batch
/// after an ambiguous failure harmless.
#[derive(Default)]
pub struct RemoteService {
    state: Mutex<UserState>,
    fail_next_send_after_apply: Mutex<Option<String>>,
}

impl RemoteService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next send apply its payload and then report the given
    /// transport failure, simulating a response lost on the wire.
    pub fn fail_next_send_after_apply(&self, message: impl Into<String>) {
        *self.fail_next_send_after_apply.lock() = Some(message.into());
    }

    /// Takes a pending injected failure, if one is armed.
    pub(crate) fn take_injected_failure(&self) -> Option<String> {
        self.fail_next_send_after_apply.lock().take()
    }

    /// Returns the currently subscribed feed URLs.
    #[must_use]
    pub fn subscribed(&self) -> BTreeSet<String> {
        self.state.lock().subscribed.clone()
    }

    /// Returns all ingested actions, in arrival order.
    #[must_use]
    pub fn actions(&self) -> Vec<EpisodeAction> {
        self.state.lock().action_stream.clone()
    }

    /// Returns the devices that have synced, in id order.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceId> {
        self.state.lock().devices.keys().cloned().collect()
    }

    /// Returns the server clock tick at which a device last talked to us.
    #[must_use]
    pub fn last_seen(&self, device: &DeviceId) -> Option<LogicalTime> {
        self.state
            .lock()
            .devices
            .get(device)
            .map(|record| record.last_seen)
    }

    /// Returns the registered kind of a device, if it is known.
    #[must_use]
    pub fn device_type(&self, device: &DeviceId) -> Option<DeviceType> {
        self.state
            .lock()
            .devices
            .get(device)
            .map(|record| record.device_type)
    }

    /// Registers a device and its kind, and returns the number of devices
    /// the account now knows. Re-registering updates the kind.
    pub fn register(&self, device: &DeviceId, device_type: DeviceType) -> u64 {
        let mut state = self.state.lock();
        let seen = state.tick();
        state.devices.insert(
            device.clone(),
            DeviceRecord {
                device_type,
                last_seen: seen,
            },
        );
        info!(%device, %device_type, "registered device");
        state.devices.len() as u64
    }

    /// Seeds a subscription change directly, as another device would.
    pub fn seed_subscription(&self, url: impl Into<String>, subscribed: bool) {
        let mut state = self.state.lock();
        let url = url.into();
        let at = state.tick();
        let change = if subscribed {
            state.subscribed.insert(url.clone());
            RemoteSubscriptionChange::subscribed(url, at)
        } else {
            state.subscribed.remove(&url);
            RemoteSubscriptionChange::unsubscribed(url, at)
        };
        state.subscription_stream.push(change);
    }

    /// Returns changes for a class since a cursor, with the stream head as
    /// the new cursor.
    pub fn fetch(
        &self,
        device: &DeviceId,
        class: DataClass,
        since: Option<SyncCursor>,
    ) -> FetchResponse {
        let mut state = self.state.lock();
        let tick = state.tick();
        state
            .devices
            .entry(device.clone())
            .and_modify(|record| record.last_seen = tick)
            .or_insert(DeviceRecord {
                device_type: DeviceType::Other,
                last_seen: tick,
            });

        let from = since.map_or(0, |c| c.as_u64() as usize);
        let (changes, head) = match class {
            DataClass::Subscriptions => {
                let stream = &state.subscription_stream;
                let from = from.min(stream.len());
                (
                    RemoteChanges::Subscriptions(stream[from..].to_vec()),
                    stream.len(),
                )
            }
            DataClass::EpisodeActions => {
                let stream = &state.action_stream;
                let from = from.min(stream.len());
                (
                    RemoteChanges::EpisodeActions(stream[from..].to_vec()),
                    stream.len(),
                )
            }
        };
        debug!(%device, %class, from, head, "served fetch");
        FetchResponse {
            changes,
            new_cursor: SyncCursor::new(head as u64),
        }
    }

    /// Applies a device's payload and returns the new stream head.
    ///
    /// The expected cursor must match the head for the class: the sync
    /// protocol requires a device to merge before sending, so a stale
    /// expectation means it sent against state it never saw.
    pub fn send(
        &self,
        device: &DeviceId,
        payload: &ChangePayload,
        expected_cursor: SyncCursor,
    ) -> ServiceResult<SyncCursor> {
        let mut state = self.state.lock();
        let head = match payload.data_class() {
            DataClass::Subscriptions => state.subscription_stream.len(),
            DataClass::EpisodeActions => state.action_stream.len(),
        };
        if expected_cursor.as_u64() as usize != head {
            return Err(ServiceError::StaleCursor {
                expected: expected_cursor,
                head: SyncCursor::new(head as u64),
            });
        }

        match payload {
            ChangePayload::Subscriptions(diff) => {
                for url in &diff.add {
                    if state.subscribed.insert(url.clone()) {
                        let at = state.tick();
                        state
                            .subscription_stream
                            .push(RemoteSubscriptionChange::subscribed(url.clone(), at));
                    }
                }
                for url in &diff.remove {
                    if state.subscribed.remove(url) {
                        let at = state.tick();
                        state
                            .subscription_stream
                            .push(RemoteSubscriptionChange::unsubscribed(url.clone(), at));
                    }
                }
                let head = state.subscription_stream.len();
                info!(%device, added = diff.add.len(), removed = diff.remove.len(), head, "applied subscription diff");
                Ok(SyncCursor::new(head as u64))
            }
            ChangePayload::EpisodeActions(actions) => {
                let mut new = 0;
                for action in actions {
                    if state.action_keys.insert(action.key()) {
                        state.action_stream.push(action.clone());
                        new += 1;
                    }
                }
                let head = state.action_stream.len();
                info!(%device, received = actions.len(), new, head, "ingested episode actions");
                Ok(SyncCursor::new(head as u64))
            }
        }
    }
}

impl UserState {
    fn tick(&mut self) -> LogicalTime {
        let now = self.clock;
        self.clock = self.clock.next();
        now
    }
}
