//! obs-websocket 5.x wire envelopes.
//!
//! Every frame is a JSON object `{"op": <code>, "d": {...}}`. The
//! handshake is Hello (0) -> Identify (1) -> Identified (2); after
//! that the server accepts Request (6) frames, answers with
//! RequestResponse (7), and pushes unsolicited Event (5) frames.

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

pub mod op {
    pub const HELLO: u32 = 0;
    pub const IDENTIFY: u32 = 1;
    pub const IDENTIFIED: u32 = 2;
    pub const EVENT: u32 = 5;
    pub const REQUEST: u32 = 6;
    pub const REQUEST_RESPONSE: u32 = 7;
}

pub const RPC_VERSION: u32 = 1;

/// Outer envelope of every server frame.
#[derive(Debug, Deserialize)]
pub struct ServerMessage {
    pub op: u32,
    #[serde(default)]
    pub d: Value,
}

/// Hello payload (op 0). `authentication` is present when the server
/// requires the challenge-response handshake.
#[derive(Debug, Deserialize)]
pub struct Hello {
    #[serde(rename = "obsWebSocketVersion", default)]
    pub obs_websocket_version: String,
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Deserialize)]
pub struct Identified {
    #[serde(rename = "negotiatedRpcVersion")]
    pub negotiated_rpc_version: u32,
}

/// Per-request outcome attached to every RequestResponse frame.
#[derive(Debug, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u32,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Derives the authentication string:
/// base64(sha256(base64(sha256(password + salt)) + challenge)).
pub fn auth_string(password: &str, challenge: &str, salt: &str) -> String {
    let secret_hash = Sha256::digest(format!("{password}{salt}").as_bytes());
    let secret = base64::engine::general_purpose::STANDARD.encode(secret_hash);

    let auth_hash = Sha256::digest(format!("{secret}{challenge}").as_bytes());
    base64::engine::general_purpose::STANDARD.encode(auth_hash)
}

pub fn identify_frame(authentication: Option<String>) -> String {
    let mut d = json!({ "rpcVersion": RPC_VERSION });
    if let Some(auth) = authentication {
        d["authentication"] = Value::String(auth);
    }
    json!({ "op": op::IDENTIFY, "d": d }).to_string()
}

pub fn request_frame(request_type: &str, request_id: &str, request_data: Option<&Value>) -> String {
    let mut d = json!({
        "requestType": request_type,
        "requestId": request_id,
    });
    if let Some(data) = request_data {
        d["requestData"] = data.clone();
    }
    json!({ "op": op::REQUEST, "d": d }).to_string()
}

/// Plucks the embedded payload out of a RequestResponse `d` object.
/// A response without one yields an empty map rather than an error.
pub fn response_data(response: &Value) -> Value {
    response
        .get("responseData")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_string_is_deterministic_base64() {
        let auth = auth_string(
            "supersecretpassword",
            "ztTBnnuqrqaKDzRM3xcVdbYm",
            "PZVbYpvAnZut2SS6JNJytDm9",
        );

        // SHA-256 output is 32 bytes, i.e. 44 base64 characters
        assert_eq!(auth.len(), 44);
        assert!(base64::engine::general_purpose::STANDARD
            .decode(&auth)
            .is_ok());
        assert_eq!(
            auth,
            auth_string(
                "supersecretpassword",
                "ztTBnnuqrqaKDzRM3xcVdbYm",
                "PZVbYpvAnZut2SS6JNJytDm9",
            )
        );
    }

    #[test]
    fn request_frame_shape() {
        let frame = request_frame("SetInputMute", "7", Some(&json!({"inputName": "Mic"})));
        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["op"], op::REQUEST);
        assert_eq!(parsed["d"]["requestType"], "SetInputMute");
        assert_eq!(parsed["d"]["requestId"], "7");
        assert_eq!(parsed["d"]["requestData"]["inputName"], "Mic");

        let frame = request_frame("GetVersion", "8", None);
        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert!(parsed["d"].get("requestData").is_none());
    }

    #[test]
    fn identify_frame_carries_auth_only_when_present() {
        let parsed: Value = serde_json::from_str(&identify_frame(None)).unwrap();
        assert_eq!(parsed["op"], op::IDENTIFY);
        assert_eq!(parsed["d"]["rpcVersion"], RPC_VERSION);
        assert!(parsed["d"].get("authentication").is_none());

        let parsed: Value =
            serde_json::from_str(&identify_frame(Some("abc".to_string()))).unwrap();
        assert_eq!(parsed["d"]["authentication"], "abc");
    }

    #[test]
    fn response_data_defaults_to_empty_map() {
        assert_eq!(
            response_data(&json!({"requestId": "1"})),
            Value::Object(Map::new())
        );
        assert_eq!(
            response_data(&json!({"responseData": {"a": 1}}))["a"],
            1
        );
    }
}
