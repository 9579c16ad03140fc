//! JSON routing that lets the engine's HTTP transport talk to the
//! in-memory service without a socket.

use crate::service::{RemoteService, ServiceError};
use podsync_engine::HttpClient;
use podsync_protocol::{
    DataClass, FetchRequest, RegisterRequest, RegisterResponse, SendRequest, SendResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// An in-process server wired straight into [`HttpClient`].
///
/// Routes `/devices/register`, `/sync/{class}/fetch`, and
/// `/sync/{class}/send` to the service.
/// Encoding, decoding, and routing behave exactly like a network server,
/// so the engine under test exercises its full wire path.
#[derive(Clone)]
pub struct LoopbackServer {
    service: Arc<RemoteService>,
}

impl LoopbackServer {
    /// Wraps a service.
    #[must_use]
    pub fn new(service: Arc<RemoteService>) -> Self {
        Self { service }
    }

    /// Returns the underlying service, for seeding and inspection.
    #[must_use]
    pub fn service(&self) -> &Arc<RemoteService> {
        &self.service
    }

    fn route(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        if path == "/devices/register" {
            let request: RegisterRequest = serde_json::from_slice(body)
                .map_err(|e| format!("bad register request: {e}"))?;
            let devices = self.service.register(&request.device, request.device_type);
            return serde_json::to_vec(&RegisterResponse { devices }).map_err(|e| e.to_string());
        }

        let (class, endpoint) = parse_path(path)?;
        match endpoint {
            "fetch" => {
                let request: FetchRequest =
                    serde_json::from_slice(body).map_err(|e| format!("bad fetch request: {e}"))?;
                if request.class != class {
                    return Err(format!(
                        "fetch body class {} does not match path {path}",
                        request.class
                    ));
                }
                let response = self
                    .service
                    .fetch(&request.device, request.class, request.since);
                serde_json::to_vec(&response).map_err(|e| e.to_string())
            }
            "send" => {
                let request: SendRequest =
                    serde_json::from_slice(body).map_err(|e| format!("bad send request: {e}"))?;
                if request.payload.data_class() != class {
                    return Err(format!(
                        "send payload class {} does not match path {path}",
                        request.payload.data_class()
                    ));
                }
                let response = match self
                    .service
                    .send(&request.device, &request.payload, request.expected_cursor)
                {
                    Ok(cursor) => {
                        // An armed failure fires after the apply, emulating
                        // a response that never reached the client.
                        if let Some(message) = self.service.take_injected_failure() {
                            debug!(path, "dropping send response after apply");
                            return Err(message);
                        }
                        SendResponse::ack(cursor)
                    }
                    Err(ServiceError::StaleCursor { .. }) => SendResponse::stale(),
                    Err(other) => SendResponse::rejected(other.to_string()),
                };
                serde_json::to_vec(&response).map_err(|e| e.to_string())
            }
            other => Err(format!("unknown endpoint '{other}' in {path}")),
        }
    }
}

fn parse_path(path: &str) -> Result<(DataClass, &str), String> {
    let mut parts = path.trim_start_matches('/').split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("sync"), Some(class), Some(endpoint), None) => {
            let class = match class {
                "subscriptions" => DataClass::Subscriptions,
                "episode_actions" => DataClass::EpisodeActions,
                other => return Err(format!("unknown data class '{other}'")),
            };
            Ok((class, endpoint))
        }
        _ => Err(format!("unroutable path '{path}'")),
    }
}

impl HttpClient for LoopbackServer {
    // An in-process call cannot hang, so the timeout goes unused.
    fn post(&self, path: &str, body: Vec<u8>, _timeout: Duration) -> Result<Vec<u8>, String> {
        self.route(path, &body)
    }
}
