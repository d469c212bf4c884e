use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObsError {
    #[error("failed to connect to OBS: {0}")]
    Connection(String),

    #[error("OBS rejected the credentials: {0}")]
    Authentication(String),

    #[error("not connected to OBS; call connect() first")]
    NotConnected,

    #[error("request failed: {0}")]
    Request(String),

    #[error("OBS rejected the request (code {code}): {comment}")]
    RequestFailed { code: u32, comment: String },

    #[error("{kind} '{name}' not found; available: {}", .available.join(", "))]
    ResourceNotFound {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },

    #[error("{0} is already running")]
    OutputRunning(&'static str),

    #[error("{0} is not running")]
    OutputNotRunning(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
