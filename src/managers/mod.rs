//! Request-shaping managers. Every method follows the same contract:
//! validate caller parameters first, then (for name-addressed
//! resources) check existence against a freshly fetched name list so a
//! miss carries the available names, then issue the request and
//! translate its payload, defaulting missing fields instead of
//! erroring.

mod inputs;
mod recording;
mod scene_items;
mod scenes;
mod sources;
mod streaming;
mod virtual_camera;

pub use inputs::{InputManager, NewInput};
pub use recording::RecordingManager;
pub use scene_items::SceneItemManager;
pub use scenes::SceneManager;
pub use sources::SourceManager;
pub use streaming::StreamingManager;
pub use virtual_camera::VirtualCameraManager;

use serde_json::Value;

use crate::errors::ObsError;

pub(crate) fn data_str(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn data_bool(data: &Value, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn data_i64(data: &Value, key: &str) -> Option<i64> {
    data.get(key).and_then(Value::as_i64)
}

/// Degrades a protocol-level rejection to the given default while
/// still propagating transport failures; mirrors callers that treat a
/// refused query (e.g. studio mode off) as "nothing there".
pub(crate) fn or_default_on_rejection<T>(
    result: Result<T, ObsError>,
    default: T,
) -> Result<T, ObsError> {
    match result {
        Err(ObsError::RequestFailed { .. }) => Ok(default),
        other => other,
    }
}

pub(crate) fn require_non_empty(value: &str, what: &str) -> Result<(), ObsError> {
    if value.trim().is_empty() {
        return Err(ObsError::InvalidParameter(format!("{what} must not be empty")));
    }
    Ok(())
}
