//! Session service thread: owns the transport for the lifetime of one
//! connection, pairs responses to requests by id, and fans pushed
//! events out to the listener registries.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, trace, warn};
use serde_json::Value;

use crate::errors::ObsError;
use crate::events::{CallbackRegistry, ObsEvent};
use crate::protocol::{op, RequestStatus, ServerMessage};
use crate::transport::Transport;

pub(crate) enum SessionCommand {
    Dispatch {
        frame: String,
        request_id: String,
        request_type: String,
        reply: Sender<Result<Value, ObsError>>,
        deadline: Instant,
    },
    Shutdown,
}

struct Waiter {
    reply: Sender<Result<Value, ObsError>>,
    deadline: Instant,
    request_type: String,
}

pub(crate) fn spawn(
    transport: Box<dyn Transport>,
    commands: Receiver<SessionCommand>,
    listeners: Arc<CallbackRegistry>,
) -> JoinHandle<()> {
    thread::spawn(move || run(transport, commands, listeners))
}

fn run(
    mut transport: Box<dyn Transport>,
    commands: Receiver<SessionCommand>,
    listeners: Arc<CallbackRegistry>,
) {
    info!("session thread started");
    let mut waiters: HashMap<String, Waiter> = HashMap::new();

    'main: loop {
        // Drain pending commands first so outgoing requests are not
        // starved while no frames are arriving.
        loop {
            match commands.try_recv() {
                Ok(SessionCommand::Dispatch {
                    frame,
                    request_id,
                    request_type,
                    reply,
                    deadline,
                }) => {
                    trace!("sending '{request_type}' (request id {request_id})");
                    match transport.send(&frame) {
                        Ok(()) => {
                            waiters.insert(
                                request_id,
                                Waiter {
                                    reply,
                                    deadline,
                                    request_type,
                                },
                            );
                        }
                        Err(e) => {
                            // reported back to the caller; the retry
                            // policy there decides what happens next
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                Ok(SessionCommand::Shutdown) => {
                    debug!("session thread received shutdown");
                    break 'main;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("command channel closed; shutting session down");
                    break 'main;
                }
            }
        }

        match transport.recv() {
            Ok(Some(frame)) => handle_frame(&frame, &mut waiters, &listeners),
            Ok(None) => {}
            Err(e) => {
                error!("transport receive failed: {e}");
                let message = e.to_string();
                for (_, waiter) in waiters.drain() {
                    let _ = waiter.reply.send(Err(ObsError::Request(message.clone())));
                }
                break;
            }
        }

        // Expire waiters whose response never arrived.
        let now = Instant::now();
        let expired: Vec<String> = waiters
            .iter()
            .filter(|(_, w)| now >= w.deadline)
            .map(|(id, _)| id.clone())
            .collect();
        for request_id in expired {
            if let Some(waiter) = waiters.remove(&request_id) {
                warn!(
                    "request '{}' (id {request_id}) timed out waiting for a response",
                    waiter.request_type
                );
                let _ = waiter.reply.send(Err(ObsError::Request(format!(
                    "timed out waiting for '{}' response",
                    waiter.request_type
                ))));
            }
        }
    }

    for (_, waiter) in waiters.drain() {
        let _ = waiter.reply.send(Err(ObsError::Request(
            "session shut down before a response arrived".to_string(),
        )));
    }
    transport.close();
    info!("session thread finished");
}

fn handle_frame(
    frame: &str,
    waiters: &mut HashMap<String, Waiter>,
    listeners: &CallbackRegistry,
) {
    let message: ServerMessage = match serde_json::from_str(frame) {
        Ok(message) => message,
        Err(e) => {
            warn!("discarding unparseable frame: {e}");
            return;
        }
    };

    match message.op {
        op::EVENT => {
            let event_type = message
                .d
                .get("eventType")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let data = message
                .d
                .get("eventData")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            listeners.dispatch(&ObsEvent { event_type, data });
        }
        op::REQUEST_RESPONSE => {
            let Some(request_id) = message.d.get("requestId").and_then(Value::as_str) else {
                warn!("response frame without a request id; dropping it");
                return;
            };
            let Some(waiter) = waiters.remove(request_id) else {
                debug!("response for unknown request id {request_id} (expired earlier?)");
                return;
            };
            let status = message
                .d
                .get("requestStatus")
                .cloned()
                .and_then(|v| serde_json::from_value::<RequestStatus>(v).ok())
                .unwrap_or(RequestStatus {
                    result: false,
                    code: 0,
                    comment: None,
                });
            let reply = if status.result {
                Ok(message.d)
            } else {
                Err(ObsError::RequestFailed {
                    code: status.code,
                    comment: status
                        .comment
                        .unwrap_or_else(|| format!("error code {}", status.code)),
                })
            };
            if waiter.reply.send(reply).is_err() {
                debug!(
                    "caller for '{}' went away before the response arrived",
                    waiter.request_type
                );
            }
        }
        other => trace!("ignoring frame with op {other}"),
    }
}
