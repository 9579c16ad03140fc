//! HTTP transport: JSON request/response over a pluggable client.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use podsync_protocol::{
    ChangePayload, DataClass, DeviceId, DeviceType, FetchRequest, FetchResponse, RegisterRequest,
    RegisterResponse, SendRequest, SendResponse, SyncCursor,
};
use std::time::Duration;
use tracing::debug;

/// The minimal HTTP capability the sync transport needs.
///
/// Only POST with a JSON body, so any blocking HTTP client (or an
/// in-process loopback) can back it. Errors are plain strings; the
/// transport classifies them all as retryable, since a client cannot
/// distinguish a dead connection from a dead server.
pub trait HttpClient: Send + Sync {
    /// Posts a JSON body to a path under the service root and returns the
    /// response body. The client must give up after `timeout`; an elapsed
    /// timeout is reported as an error like any other.
    fn post(&self, path: &str, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, String>;
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`SyncTransport`] speaking the JSON sync protocol over an
/// [`HttpClient`].
pub struct HttpTransport<C: HttpClient> {
    client: C,
    timeout: Duration,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Wraps an HTTP client.
    pub fn new(client: C) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-request timeout handed to the client.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn post_json<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> SyncResult<Resp> {
        let body = serde_json::to_vec(request)
            .map_err(|e| SyncError::Protocol(format!("encoding request: {e}")))?;
        debug!(path, bytes = body.len(), "posting sync request");

        let response = self
            .client
            .post(path, body, self.timeout)
            .map_err(SyncError::transport_retryable)?;

        serde_json::from_slice(&response)
            .map_err(|e| SyncError::Protocol(format!("decoding response from {path}: {e}")))
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn register_device(&self, device: &DeviceId, device_type: DeviceType) -> SyncResult<()> {
        let request = RegisterRequest {
            device: device.clone(),
            device_type,
        };
        let response: RegisterResponse = self.post_json("/devices/register", &request)?;
        debug!(%device, %device_type, devices = response.devices, "registered device");
        Ok(())
    }

    fn fetch_changes(
        &self,
        device: &DeviceId,
        class: DataClass,
        since: Option<SyncCursor>,
    ) -> SyncResult<FetchResponse> {
        let request = FetchRequest {
            device: device.clone(),
            class,
            since,
        };
        self.post_json(&format!("/sync/{class}/fetch"), &request)
    }

    fn send_changes(
        &self,
        device: &DeviceId,
        class: DataClass,
        payload: &ChangePayload,
        expected_cursor: SyncCursor,
    ) -> SyncResult<SyncCursor> {
        let request = SendRequest {
            device: device.clone(),
            class,
            payload: payload.clone(),
            expected_cursor,
        };
        let response: SendResponse = self.post_json(&format!("/sync/{class}/send"), &request)?;

        if response.stale_cursor {
            return Err(SyncError::StaleCursor {
                expected: expected_cursor,
            });
        }
        if let Some(message) = response.error {
            return Err(SyncError::Protocol(message));
        }
        response
            .ack_cursor
            .ok_or_else(|| SyncError::Protocol("send response carried no ack cursor".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use podsync_protocol::{RemoteChanges, SubscriptionDiff};

    /// Replays canned response bodies and records request paths and
    /// timeouts.
    struct CannedClient {
        responses: Mutex<Vec<Result<Vec<u8>, String>>>,
        paths: Mutex<Vec<String>>,
        timeouts: Mutex<Vec<Duration>>,
    }

    impl CannedClient {
        fn new(responses: Vec<Result<Vec<u8>, String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                paths: Mutex::new(Vec::new()),
                timeouts: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for CannedClient {
        fn post(&self, path: &str, _body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, String> {
            self.paths.lock().push(path.to_string());
            self.timeouts.lock().push(timeout);
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err("no canned response".into()))
        }
    }

    #[test]
    fn fetch_round_trips_json() {
        let response = FetchResponse {
            changes: RemoteChanges::Subscriptions(Vec::new()),
            new_cursor: SyncCursor::new(12),
        };
        let client = CannedClient::new(vec![Ok(serde_json::to_vec(&response).unwrap())]);
        let transport = HttpTransport::new(client);

        let fetched = transport
            .fetch_changes(&DeviceId::new("d1"), DataClass::Subscriptions, None)
            .unwrap();
        assert_eq!(fetched.new_cursor, SyncCursor::new(12));
        assert_eq!(
            transport.client.paths.lock().as_slice(),
            ["/sync/subscriptions/fetch"]
        );
    }

    #[test]
    fn stale_response_maps_to_stale_cursor_error() {
        let client =
            CannedClient::new(vec![Ok(serde_json::to_vec(&SendResponse::stale()).unwrap())]);
        let transport = HttpTransport::new(client);

        let err = transport
            .send_changes(
                &DeviceId::new("d1"),
                DataClass::Subscriptions,
                &ChangePayload::Subscriptions(SubscriptionDiff::default()),
                SyncCursor::new(8),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::StaleCursor {
                expected
            } if expected == SyncCursor::new(8)
        ));
    }

    #[test]
    fn configured_timeout_reaches_the_client() {
        let response = FetchResponse {
            changes: RemoteChanges::Subscriptions(Vec::new()),
            new_cursor: SyncCursor::new(1),
        };
        let client = CannedClient::new(vec![Ok(serde_json::to_vec(&response).unwrap())]);
        let transport = HttpTransport::new(client).with_timeout(Duration::from_secs(5));

        transport
            .fetch_changes(&DeviceId::new("d1"), DataClass::Subscriptions, None)
            .unwrap();
        assert_eq!(
            transport.client.timeouts.lock().as_slice(),
            [Duration::from_secs(5)]
        );
    }

    #[test]
    fn registration_posts_the_device_kind() {
        let response = RegisterResponse { devices: 1 };
        let client = CannedClient::new(vec![Ok(serde_json::to_vec(&response).unwrap())]);
        let transport = HttpTransport::new(client);

        transport
            .register_device(&DeviceId::new("phone-7"), DeviceType::Mobile)
            .unwrap();
        assert_eq!(
            transport.client.paths.lock().as_slice(),
            ["/devices/register"]
        );
    }

    #[test]
    fn client_failure_is_retryable() {
        let client = CannedClient::new(vec![Err("connection refused".into())]);
        let transport = HttpTransport::new(client);

        let err = transport
            .fetch_changes(&DeviceId::new("d1"), DataClass::EpisodeActions, None)
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn garbage_response_is_a_protocol_error() {
        let client = CannedClient::new(vec![Ok(b"<html>502</html>".to_vec())]);
        let transport = HttpTransport::new(client);

        let err = transport
            .fetch_changes(&DeviceId::new("d1"), DataClass::Subscriptions, None)
            .unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
        assert!(!err.is_retryable());
    }
}
