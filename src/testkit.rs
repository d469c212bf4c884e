//! Crate-private test support: a scripted transport double so the
//! client, session loop, and managers can be exercised without a
//! running OBS instance.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::client::ObsClient;
use crate::config::ObsConfig;
use crate::errors::ObsError;
use crate::transport::Transport;

/// What the fake does with the next incoming request.
pub(crate) enum FakeReply {
    /// Deliver a successful response whose `responseData` is the value.
    Respond(Value),
    /// Deliver a response with `requestStatus.result == false`.
    Reject { code: u32, comment: String },
    /// Fail the send itself, as a broken socket would.
    Fail(String),
    /// Swallow the request so the caller's deadline expires.
    Ignore,
}

#[derive(Default)]
pub(crate) struct FakeState {
    script: Mutex<VecDeque<FakeReply>>,
    requests: Mutex<Vec<(String, Value, String)>>,
    inbound: Mutex<VecDeque<String>>,
    connects: AtomicUsize,
    closed: AtomicBool,
}

impl FakeState {
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests seen so far as (requestType, requestData, requestId).
    pub fn requests(&self) -> Vec<(String, Value, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Queues a pushed event frame for the session thread to pick up.
    pub fn push_event(&self, event_type: &str, data: Value) {
        let frame = json!({
            "op": 5,
            "d": { "eventType": event_type, "eventData": data }
        });
        self.inbound.lock().unwrap().push_back(frame.to_string());
    }

    pub fn wait_closed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.closed.load(Ordering::SeqCst) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeTransport {
    state: Arc<FakeState>,
}

impl Transport for FakeTransport {
    fn send(&mut self, frame: &str) -> Result<(), ObsError> {
        let parsed: Value = serde_json::from_str(frame).expect("client sent malformed JSON");
        let d = &parsed["d"];
        let request_type = d["requestType"].as_str().unwrap_or_default().to_string();
        let request_id = d["requestId"].as_str().unwrap_or_default().to_string();
        let request_data = d.get("requestData").cloned().unwrap_or(json!({}));
        self.state.requests.lock().unwrap().push((
            request_type.clone(),
            request_data,
            request_id.clone(),
        ));

        let reply = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeReply::Respond(json!({})));
        match reply {
            FakeReply::Respond(data) => {
                let frame = json!({
                    "op": 7,
                    "d": {
                        "requestType": request_type,
                        "requestId": request_id,
                        "requestStatus": { "result": true, "code": 100 },
                        "responseData": data,
                    }
                });
                self.state
                    .inbound
                    .lock()
                    .unwrap()
                    .push_back(frame.to_string());
                Ok(())
            }
            FakeReply::Reject { code, comment } => {
                let frame = json!({
                    "op": 7,
                    "d": {
                        "requestType": request_type,
                        "requestId": request_id,
                        "requestStatus": { "result": false, "code": code, "comment": comment },
                    }
                });
                self.state
                    .inbound
                    .lock()
                    .unwrap()
                    .push_back(frame.to_string());
                Ok(())
            }
            FakeReply::Fail(message) => Err(ObsError::Request(message)),
            FakeReply::Ignore => Ok(()),
        }
    }

    fn recv(&mut self) -> Result<Option<String>, ObsError> {
        if let Some(frame) = self.state.inbound.lock().unwrap().pop_front() {
            return Ok(Some(frame));
        }
        // short poll keeps the session loop responsive in tests
        thread::sleep(Duration::from_millis(2));
        Ok(None)
    }

    fn close(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// A config suitable for tests: no auto-connect, short request bound.
pub(crate) fn test_config() -> ObsConfig {
    ObsConfig::default()
        .with_auto_connect(false)
        .with_request_timeout(Duration::from_secs(5))
}

/// Builds a disconnected client whose transport replays `script`.
pub(crate) fn client(script: Vec<FakeReply>) -> (ObsClient, Arc<FakeState>) {
    client_with_config(test_config(), script)
}

pub(crate) fn client_with_config(
    config: ObsConfig,
    script: Vec<FakeReply>,
) -> (ObsClient, Arc<FakeState>) {
    let state = Arc::new(FakeState {
        script: Mutex::new(script.into()),
        ..FakeState::default()
    });
    let connector_state = Arc::clone(&state);
    let client = ObsClient::with_connector(
        config,
        Box::new(move |_config| {
            connector_state.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeTransport {
                state: Arc::clone(&connector_state),
            }) as Box<dyn Transport>)
        }),
    );
    (client, state)
}

/// Builds a client whose connector always refuses, as an unreachable
/// endpoint would.
pub(crate) fn refusing_client() -> (ObsClient, Arc<FakeState>) {
    let state = Arc::new(FakeState::default());
    let connector_state = Arc::clone(&state);
    let client = ObsClient::with_connector(
        test_config(),
        Box::new(move |config| {
            connector_state.connects.fetch_add(1, Ordering::SeqCst);
            Err(ObsError::Connection(format!(
                "TCP connect to {} failed: connection refused",
                config.websocket_url()
            )))
        }),
    );
    (client, state)
}
