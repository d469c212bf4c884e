//! The connection/request layer: one exclusive WebSocket session,
//! blocking request execution with bounded backoff retry, and listener
//! registration for pushed events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::ObsConfig;
use crate::errors::ObsError;
use crate::events::{CallbackRegistry, ListenerId, ObsEvent};
use crate::protocol;
use crate::retry::RetryPolicy;
use crate::session::{self, SessionCommand};
use crate::transport::{self, Connector};

/// Base delay of the request retry schedule; retry `k` sleeps
/// `500ms * 2^(k-1)` first.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Extra slack on top of the request timeout when waiting for the
/// session thread's reply, so its own deadline sweep fires first.
const REPLY_GRACE: Duration = Duration::from_millis(200);

struct SessionHandle {
    commands: Sender<SessionCommand>,
    thread: Option<JoinHandle<()>>,
}

/// Client for one obs-websocket session.
///
/// The client is connected if and only if a session handle exists;
/// every request and event operation requires that invariant and
/// reports [`ObsError::NotConnected`] when it does not hold. There is
/// no reconnection automation: after a failure the caller decides
/// whether to call [`ObsClient::connect`] again.
pub struct ObsClient {
    config: ObsConfig,
    connector: Box<Connector>,
    retry: RetryPolicy,
    session: Mutex<Option<SessionHandle>>,
    listeners: Arc<CallbackRegistry>,
    next_request_id: AtomicU64,
}

impl ObsClient {
    pub fn new(config: ObsConfig) -> Result<Self, ObsError> {
        config.validate()?;
        Ok(Self::with_connector(config, transport::default_connector()))
    }

    pub(crate) fn with_connector(config: ObsConfig, connector: Box<Connector>) -> Self {
        let retry = RetryPolicy::new(config.max_retries, RETRY_BASE_DELAY);
        Self {
            config,
            connector,
            retry,
            session: Mutex::new(None),
            listeners: Arc::new(CallbackRegistry::default()),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ObsConfig {
        &self.config
    }

    /// Opens the session. A no-op when already connected; on failure
    /// the client stays disconnected and the error distinguishes a
    /// rejected credential from any other connection problem.
    pub fn connect(&self) -> Result<(), ObsError> {
        let mut session = self.lock_session();
        if session.is_some() {
            debug!("connect() called while already connected");
            return Ok(());
        }

        let transport = (self.connector)(&self.config)?;
        let (commands, command_rx) = mpsc::channel();
        let thread = session::spawn(transport, command_rx, Arc::clone(&self.listeners));
        *session = Some(SessionHandle {
            commands,
            thread: Some(thread),
        });
        info!("connected to OBS at {}", self.config.websocket_url());
        Ok(())
    }

    /// Closes the session. A no-op when not connected. Whatever
    /// happens during teardown, the client ends up Disconnected.
    pub fn disconnect(&self) {
        let handle = {
            let mut session = self.lock_session();
            session.take()
        };
        let Some(mut handle) = handle else {
            return;
        };

        let _ = handle.commands.send(SessionCommand::Shutdown);
        if let Some(thread) = handle.thread.take() {
            if thread.join().is_err() {
                warn!("session thread panicked during shutdown");
            }
        }
        info!("disconnected from OBS");
    }

    pub fn is_connected(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Executes one request and returns the response envelope.
    ///
    /// Transient transport failures are retried with the exponential
    /// backoff schedule; after exhausting the attempts a single
    /// aggregated [`ObsError::Request`] wrapping the last failure is
    /// returned. Calling while disconnected fails immediately without
    /// any retry, as does a protocol-level rejection
    /// ([`ObsError::RequestFailed`]) since resending an identical
    /// request cannot change the answer.
    ///
    /// This blocks the calling thread across the retries; there is no
    /// cancellation of an in-flight retry loop.
    pub fn call(&self, request_type: &str, request_data: Option<Value>) -> Result<Value, ObsError> {
        let mut last_failure = String::new();
        for attempt in 0..self.retry.total_attempts() {
            if attempt > 0 {
                let delay = self.retry.delay_before(attempt);
                debug!(
                    "retrying '{request_type}' in {:?} (attempt {}/{})",
                    delay,
                    attempt + 1,
                    self.retry.total_attempts()
                );
                thread::sleep(delay);
            }
            match self.dispatch_once(request_type, request_data.as_ref()) {
                Ok(response) => return Ok(response),
                Err(ObsError::Request(message)) => {
                    warn!(
                        "request '{request_type}' failed (attempt {}/{}): {message}",
                        attempt + 1,
                        self.retry.total_attempts()
                    );
                    last_failure = message;
                }
                Err(other) => return Err(other),
            }
        }
        Err(ObsError::Request(format!(
            "'{request_type}' failed after {} attempts: {last_failure}",
            self.retry.total_attempts()
        )))
    }

    fn dispatch_once(
        &self,
        request_type: &str,
        request_data: Option<&Value>,
    ) -> Result<Value, ObsError> {
        let commands = {
            let session = self.lock_session();
            let handle = session.as_ref().ok_or(ObsError::NotConnected)?;
            handle.commands.clone()
        };

        let request_id = self
            .next_request_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let frame = protocol::request_frame(request_type, &request_id, request_data);
        let (reply, reply_rx) = mpsc::channel();
        commands
            .send(SessionCommand::Dispatch {
                frame,
                request_id,
                request_type: request_type.to_string(),
                reply,
                deadline: Instant::now() + self.config.request_timeout,
            })
            .map_err(|_| ObsError::Request("session thread is gone".to_string()))?;

        match reply_rx.recv_timeout(self.config.request_timeout + REPLY_GRACE) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ObsError::Request(format!(
                "no response to '{request_type}' within {:?}",
                self.config.request_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(ObsError::Request(
                "session closed while waiting for the response".to_string(),
            )),
        }
    }

    /// Registers a listener invoked for every pushed event.
    pub fn register_event_callback<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ObsEvent) + Send + Sync + 'static,
    {
        self.listeners.register_global(Arc::new(callback))
    }

    /// Registers a listener invoked only for events of `event_type`
    /// (e.g. "CurrentProgramSceneChanged").
    pub fn register_event_callback_for<F>(&self, event_type: &str, callback: F) -> ListenerId
    where
        F: Fn(&ObsEvent) + Send + Sync + 'static,
    {
        self.listeners.register_for(event_type, Arc::new(callback))
    }

    /// Removes a previously registered listener. Unknown ids are
    /// tolerated and merely logged.
    pub fn unregister_event_callback(&self, id: ListenerId) {
        self.listeners.unregister(id);
    }

    /// OBS version and capability information.
    pub fn get_version(&self) -> Result<Value, ObsError> {
        self.call("GetVersion", None)
            .map(|response| protocol::response_data(&response))
    }

    /// Render/encode statistics of the running instance.
    pub fn get_stats(&self) -> Result<Value, ObsError> {
        self.call("GetStats", None)
            .map(|response| protocol::response_data(&response))
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<SessionHandle>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ObsClient {
    fn drop(&mut self) {
        if self.is_connected() {
            debug!("client dropped while connected; disconnecting");
            self.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeReply};
    use serde_json::json;

    #[test]
    fn call_while_disconnected_fails_immediately() {
        let (client, state) = testkit::client(vec![]);
        let started = Instant::now();
        let err = client.call("GetVersion", None).unwrap_err();
        assert!(matches!(err, ObsError::NotConnected));
        // the precondition is never retried, so no backoff sleeps ran
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(state.request_count(), 0);
    }

    #[test]
    fn connect_twice_opens_one_session() {
        let (client, state) = testkit::client(vec![]);
        client.connect().unwrap();
        client.connect().unwrap();
        assert_eq!(state.connect_count(), 1);
        assert!(client.is_connected());
        client.disconnect();
        assert!(!client.is_connected());
    }

    #[test]
    fn failed_connect_leaves_the_client_disconnected() {
        let (client, state) = testkit::refusing_client();
        let err = client.connect().unwrap_err();
        assert!(matches!(err, ObsError::Connection(_)));
        assert!(!client.is_connected());
        assert_eq!(state.connect_count(), 1);
    }

    #[test]
    fn call_returns_the_response_payload() {
        let (client, state) = testkit::client(vec![FakeReply::Respond(
            json!({"obsVersion": "30.0.0", "obsWebSocketVersion": "5.3.0"}),
        )]);
        client.connect().unwrap();

        let version = client.get_version().unwrap();
        assert_eq!(version["obsVersion"], "30.0.0");
        assert_eq!(state.request_count(), 1);
        assert_eq!(state.requests()[0].0, "GetVersion");
    }

    #[test]
    fn transient_failures_are_retried_with_backoff() {
        // fails twice, then succeeds; with max_retries=2 the schedule
        // is 0.5s before the second attempt and 1.0s before the third
        let (client, state) = testkit::client_with_config(
            testkit::test_config().with_max_retries(2),
            vec![
                FakeReply::Fail("socket reset".to_string()),
                FakeReply::Fail("socket reset".to_string()),
                FakeReply::Respond(json!({"obsVersion": "30.0.0"})),
            ],
        );
        client.connect().unwrap();

        let started = Instant::now();
        let version = client.get_version().unwrap();
        assert_eq!(version["obsVersion"], "30.0.0");
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert_eq!(state.request_count(), 3);
    }

    #[test]
    fn exhausted_retries_surface_one_aggregated_error() {
        let (client, state) = testkit::client_with_config(
            testkit::test_config().with_max_retries(1),
            vec![
                FakeReply::Fail("first failure".to_string()),
                FakeReply::Fail("second failure".to_string()),
            ],
        );
        client.connect().unwrap();

        match client.call("GetStats", None) {
            Err(ObsError::Request(message)) => {
                assert!(message.contains("after 2 attempts"), "{message}");
                assert!(message.contains("second failure"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(state.request_count(), 2);
    }

    #[test]
    fn protocol_rejections_are_not_retried() {
        let (client, state) = testkit::client(vec![FakeReply::Reject {
            code: 600,
            comment: "No source was found".to_string(),
        }]);
        client.connect().unwrap();

        match client.call("GetInputMute", Some(json!({"inputName": "Ghost"}))) {
            Err(ObsError::RequestFailed { code, comment }) => {
                assert_eq!(code, 600);
                assert_eq!(comment, "No source was found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(state.request_count(), 1);
    }

    #[test]
    fn response_timeout_is_reported_as_a_request_failure() {
        let (client, state) = testkit::client_with_config(
            testkit::test_config()
                .with_max_retries(0)
                .with_request_timeout(Duration::from_millis(200)),
            vec![FakeReply::Ignore],
        );
        client.connect().unwrap();

        match client.call("GetVersion", None) {
            Err(ObsError::Request(message)) => {
                assert!(message.contains("after 1 attempts"), "{message}")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(state.request_count(), 1);
    }

    #[test]
    fn pushed_events_reach_listeners_on_the_session_thread() {
        let (client, state) = testkit::client(vec![]);
        client.connect().unwrap();

        let (seen_tx, seen_rx) = mpsc::channel();
        let seen_tx = Mutex::new(seen_tx); // callbacks must be Sync
        client.register_event_callback_for("CurrentProgramSceneChanged", move |event| {
            let _ = seen_tx
                .lock()
                .unwrap()
                .send(event.data["sceneName"].as_str().unwrap_or("").to_string());
        });

        state.push_event("CurrentProgramSceneChanged", json!({"sceneName": "Game"}));
        let scene = seen_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("event was not dispatched");
        assert_eq!(scene, "Game");
    }

    #[test]
    fn dropping_a_connected_client_closes_the_session() {
        let (client, state) = testkit::client(vec![]);
        client.connect().unwrap();
        drop(client);
        assert!(state.wait_closed(Duration::from_secs(2)));
    }

    #[test]
    fn session_is_torn_down_even_when_the_owning_scope_panics() {
        let (client, state) = testkit::client(vec![]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            client.connect().unwrap();
            panic!("caller bug");
        }));
        assert!(result.is_err());
        drop(client);
        assert!(state.wait_closed(Duration::from_secs(2)));
    }
}
