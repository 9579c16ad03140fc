//! Transport capability consumed by the sync engine.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use podsync_protocol::{ChangePayload, DataClass, DeviceId, DeviceType, FetchResponse, SyncCursor};
use std::collections::{BTreeMap, VecDeque};

/// The request/response capability the engine needs from the network.
///
/// Implementations perform the actual exchange (HTTP, loopback, mock);
/// the engine only assumes the calls may block for a long time and may
/// fail transiently. A send that fails after the request went out is
/// ambiguous: the engine re-fetches from the old cursor to find out
/// whether the remote applied it.
pub trait SyncTransport: Send + Sync {
    /// Announces the device and its kind to the remote service.
    ///
    /// Registration is idempotent; re-registering updates the kind.
    fn register_device(&self, device: &DeviceId, device_type: DeviceType) -> SyncResult<()>;

    /// Fetches remote changes for a class since the given cursor.
    fn fetch_changes(
        &self,
        device: &DeviceId,
        class: DataClass,
        since: Option<SyncCursor>,
    ) -> SyncResult<FetchResponse>;

    /// Sends local changes and returns the acknowledgment cursor.
    ///
    /// Fails with [`SyncError::StaleCursor`] if `expected_cursor` is no
    /// longer current on the remote.
    fn send_changes(
        &self,
        device: &DeviceId,
        class: DataClass,
        payload: &ChangePayload,
        expected_cursor: SyncCursor,
    ) -> SyncResult<SyncCursor>;
}

/// A record of one `send_changes` call observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct SentPayload {
    /// Data class of the send.
    pub class: DataClass,
    /// The payload that was sent.
    pub payload: ChangePayload,
    /// The expected cursor the engine passed.
    pub expected_cursor: SyncCursor,
}

/// A scripted transport for unit tests.
#[derive(Default)]
pub struct MockTransport {
    fetch_script: Mutex<BTreeMap<DataClass, VecDeque<SyncResult<FetchResponse>>>>,
    send_script: Mutex<BTreeMap<DataClass, VecDeque<SyncResult<SyncCursor>>>>,
    sent: Mutex<Vec<SentPayload>>,
    registered: Mutex<Vec<(DeviceId, DeviceType)>>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a fetch response for a class.
    pub fn push_fetch(&self, class: DataClass, response: FetchResponse) {
        self.fetch_script
            .lock()
            .entry(class)
            .or_default()
            .push_back(Ok(response));
    }

    /// Queues a fetch failure for a class.
    pub fn push_fetch_error(&self, class: DataClass, error: SyncError) {
        self.fetch_script
            .lock()
            .entry(class)
            .or_default()
            .push_back(Err(error));
    }

    /// Queues a send acknowledgment for a class.
    pub fn push_send_ack(&self, class: DataClass, cursor: SyncCursor) {
        self.send_script
            .lock()
            .entry(class)
            .or_default()
            .push_back(Ok(cursor));
    }

    /// Queues a send failure for a class.
    pub fn push_send_error(&self, class: DataClass, error: SyncError) {
        self.send_script
            .lock()
            .entry(class)
            .or_default()
            .push_back(Err(error));
    }

    /// Returns all payloads the engine sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentPayload> {
        self.sent.lock().clone()
    }

    /// Returns all device registrations observed, in order.
    #[must_use]
    pub fn registered(&self) -> Vec<(DeviceId, DeviceType)> {
        self.registered.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn register_device(&self, device: &DeviceId, device_type: DeviceType) -> SyncResult<()> {
        self.registered.lock().push((device.clone(), device_type));
        Ok(())
    }

    fn fetch_changes(
        &self,
        _device: &DeviceId,
        class: DataClass,
        _since: Option<SyncCursor>,
    ) -> SyncResult<FetchResponse> {
        self.fetch_script
            .lock()
            .get_mut(&class)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(SyncError::Protocol(format!(
                    "no scripted fetch response for {class}"
                )))
            })
    }

    fn send_changes(
        &self,
        _device: &DeviceId,
        class: DataClass,
        payload: &ChangePayload,
        expected_cursor: SyncCursor,
    ) -> SyncResult<SyncCursor> {
        self.sent.lock().push(SentPayload {
            class,
            payload: payload.clone(),
            expected_cursor,
        });
        self.send_script
            .lock()
            .get_mut(&class)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(SyncError::Protocol(format!(
                    "no scripted send response for {class}"
                )))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podsync_protocol::RemoteChanges;

    #[test]
    fn scripted_responses_pop_in_order() {
        let transport = MockTransport::new();
        transport.push_fetch(
            DataClass::Subscriptions,
            FetchResponse {
                changes: RemoteChanges::Subscriptions(Vec::new()),
                new_cursor: SyncCursor::new(1),
            },
        );
        transport.push_fetch_error(
            DataClass::Subscriptions,
            SyncError::transport_retryable("down"),
        );

        let device = DeviceId::new("d1");
        let first = transport
            .fetch_changes(&device, DataClass::Subscriptions, None)
            .unwrap();
        assert_eq!(first.new_cursor, SyncCursor::new(1));

        let second = transport.fetch_changes(&device, DataClass::Subscriptions, None);
        assert!(second.is_err());
    }

    #[test]
    fn unscripted_call_is_a_protocol_error() {
        let transport = MockTransport::new();
        let device = DeviceId::new("d1");
        let result = transport.fetch_changes(&device, DataClass::EpisodeActions, None);
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }

    #[test]
    fn registrations_are_recorded() {
        let transport = MockTransport::new();
        let device = DeviceId::new("phone-7");
        transport
            .register_device(&device, DeviceType::Mobile)
            .unwrap();

        assert_eq!(transport.registered(), vec![(device, DeviceType::Mobile)]);
    }

    #[test]
    fn sends_are_recorded() {
        let transport = MockTransport::new();
        transport.push_send_ack(DataClass::EpisodeActions, SyncCursor::new(2));

        let device = DeviceId::new("d1");
        let payload = ChangePayload::EpisodeActions(Vec::new());
        let ack = transport
            .send_changes(&device, DataClass::EpisodeActions, &payload, SyncCursor::new(1))
            .unwrap();

        assert_eq!(ack, SyncCursor::new(2));
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].expected_cursor, SyncCursor::new(1));
    }
}
