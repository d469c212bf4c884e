//! Blocking transport behind the client: a small trait so the session
//! loop can be driven by a scripted double in tests, plus the real
//! WebSocket implementation with the obs-websocket handshake.

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::config::ObsConfig;
use crate::errors::ObsError;
use crate::protocol::{self, op, Hello, Identified, ServerMessage};

/// How long one `recv` poll blocks before reporting "nothing yet".
/// Keeps the session loop responsive to outgoing requests and shutdown.
pub(crate) const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) trait Transport: Send {
    /// Sends one text frame.
    fn send(&mut self, frame: &str) -> Result<(), ObsError>;

    /// Waits up to the poll interval for one inbound text frame;
    /// `Ok(None)` when nothing arrived in time.
    fn recv(&mut self) -> Result<Option<String>, ObsError>;

    /// Best-effort close of the underlying stream.
    fn close(&mut self);
}

/// Opens and authenticates a transport for the given endpoint.
pub(crate) type Connector =
    dyn Fn(&ObsConfig) -> Result<Box<dyn Transport>, ObsError> + Send + Sync;

pub(crate) fn default_connector() -> Box<Connector> {
    Box::new(|config| WsTransport::connect(config).map(|t| Box::new(t) as Box<dyn Transport>))
}

pub(crate) struct WsTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Establishes the session: TCP connect bounded by the configured
    /// timeout, WebSocket upgrade, then the Hello -> Identify ->
    /// Identified exchange. A rejected credential is reported as
    /// [`ObsError::Authentication`], anything else as
    /// [`ObsError::Connection`].
    pub fn connect(config: &ObsConfig) -> Result<Self, ObsError> {
        let url = config.websocket_url();
        debug!("opening WebSocket session to {url}");

        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| ObsError::Connection(format!("cannot resolve {}: {e}", config.host)))?
            .next()
            .ok_or_else(|| {
                ObsError::Connection(format!("no address found for {}", config.host))
            })?;

        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
            .map_err(|e| ObsError::Connection(format!("TCP connect to {addr} failed: {e}")))?;
        stream
            .set_read_timeout(Some(config.connect_timeout))
            .map_err(|e| ObsError::Connection(format!("cannot configure socket: {e}")))?;

        let (mut socket, _response) =
            tungstenite::client(url.as_str(), MaybeTlsStream::Plain(stream))
                .map_err(|e| ObsError::Connection(format!("WebSocket handshake failed: {e}")))?;

        // Hello (op 0)
        let hello = read_envelope(&mut socket, "Hello")?;
        if hello.op != op::HELLO {
            return Err(ObsError::Connection(format!(
                "expected Hello from server, got op {}",
                hello.op
            )));
        }
        let hello: Hello = serde_json::from_value(hello.d)
            .map_err(|e| ObsError::Connection(format!("malformed Hello payload: {e}")))?;
        debug!(
            "server speaks obs-websocket {} (auth required: {})",
            hello.obs_websocket_version,
            hello.authentication.is_some()
        );

        // Identify (op 1), carrying the challenge response when demanded
        let auth_required = hello.authentication.is_some();
        let authentication = match hello.authentication {
            Some(challenge) => {
                if config.password.is_empty() {
                    return Err(ObsError::Authentication(
                        "server requires a password but none is configured".to_string(),
                    ));
                }
                Some(protocol::auth_string(
                    &config.password,
                    &challenge.challenge,
                    &challenge.salt,
                ))
            }
            None => None,
        };
        socket
            .send(Message::Text(protocol::identify_frame(authentication)))
            .map_err(|e| ObsError::Connection(format!("failed to send Identify: {e}")))?;

        // Identified (op 2); anything else after an auth challenge means
        // the credential was rejected
        let identified = match read_envelope(&mut socket, "Identified") {
            Ok(envelope) => envelope,
            Err(e) if auth_required => {
                return Err(ObsError::Authentication(format!(
                    "server closed the session after Identify: {e}"
                )))
            }
            Err(e) => return Err(e),
        };
        if identified.op != op::IDENTIFIED {
            let detail = format!("expected Identified, got op {}", identified.op);
            return Err(if auth_required {
                ObsError::Authentication(detail)
            } else {
                ObsError::Connection(detail)
            });
        }
        let identified: Identified = serde_json::from_value(identified.d)
            .map_err(|e| ObsError::Connection(format!("malformed Identified payload: {e}")))?;
        info!(
            "session identified (rpc version {})",
            identified.negotiated_rpc_version
        );

        // From here on the socket is polled by the session thread
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream
                .set_read_timeout(Some(READ_POLL_INTERVAL))
                .map_err(|e| ObsError::Connection(format!("cannot configure socket: {e}")))?;
        }

        Ok(Self { socket })
    }
}

fn read_envelope(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    expected: &str,
) -> Result<ServerMessage, ObsError> {
    loop {
        let message = socket
            .read()
            .map_err(|e| ObsError::Connection(format!("failed to read {expected}: {e}")))?;
        match message {
            Message::Text(text) => {
                return serde_json::from_str(&text).map_err(|e| {
                    ObsError::Connection(format!("malformed {expected} frame: {e}"))
                })
            }
            Message::Close(frame) => {
                return Err(ObsError::Connection(format!(
                    "server closed the session while waiting for {expected}: {}",
                    frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "no reason given".to_string())
                )))
            }
            // control frames during the handshake are ignored
            _ => continue,
        }
    }
}

impl Transport for WsTransport {
    fn send(&mut self, frame: &str) -> Result<(), ObsError> {
        self.socket
            .send(Message::Text(frame.to_string()))
            .map_err(|e| ObsError::Request(format!("WebSocket send failed: {e}")))
    }

    fn recv(&mut self) -> Result<Option<String>, ObsError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(text.to_string())),
            // tungstenite answers pings internally; other control and
            // binary frames carry nothing for us
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {
                Ok(None)
            }
            Ok(Message::Close(_)) => Err(ObsError::Request(
                "server closed the WebSocket session".to_string(),
            )),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(e) => Err(ObsError::Request(format!("WebSocket read failed: {e}"))),
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.socket.close(None) {
            debug!("close handshake did not complete: {e}");
        }
        // drain until the close is acknowledged or the peer goes away
        for _ in 0..10 {
            match self.socket.read() {
                Ok(_) => continue,
                Err(tungstenite::Error::Io(e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue
                }
                Err(_) => break,
            }
        }
        debug!("WebSocket session closed");
    }
}
