//! Typed views over response payloads and the summary/info structures
//! the managers hand back. Wire-facing structs default every field so
//! a payload the server left out degrades to an empty value instead of
//! an error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- scenes ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SceneEntry {
    #[serde(rename = "sceneName", default)]
    pub scene_name: String,
    #[serde(rename = "sceneIndex", default)]
    pub scene_index: i64,
    #[serde(rename = "sceneUuid", default)]
    pub scene_uuid: String,
}

/// A scene's transition override; `None` fields mean "no override".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TransitionOverride {
    #[serde(rename = "transitionName", default)]
    pub transition_name: Option<String>,
    #[serde(rename = "transitionDuration", default)]
    pub transition_duration: Option<i64>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct SceneInfo {
    pub current_program: String,
    pub current_preview: String,
    pub studio_mode: bool,
    pub total_scenes: usize,
    pub scene_names: Vec<String>,
}

// --- inputs ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InputEntry {
    #[serde(rename = "inputName", default)]
    pub input_name: String,
    #[serde(rename = "inputKind", default)]
    pub input_kind: String,
    #[serde(rename = "unversionedInputKind", default)]
    pub unversioned_input_kind: Option<String>,
    #[serde(rename = "inputUuid", default)]
    pub input_uuid: String,
}

/// The fixed desktop-audio / microphone slots OBS manages itself.
/// Unassigned slots come back as empty strings.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct SpecialInputs {
    pub desktop1: String,
    pub desktop2: String,
    pub mic1: String,
    pub mic2: String,
    pub mic3: String,
    pub mic4: String,
}

/// Result of creating an input inside a scene.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct CreatedInput {
    pub input_name: String,
    pub input_kind: String,
    pub input_uuid: String,
    pub scene_item_id: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct InputsInfo {
    pub total_inputs: usize,
    pub audio_inputs: usize,
    pub available_input_kinds: usize,
    pub input_names: Vec<String>,
    pub audio_input_names: Vec<String>,
    /// mute state per audio input; `None` when the query failed
    pub audio_mute_status: HashMap<String, Option<bool>>,
    pub available_kinds: Vec<String>,
    pub input_type_distribution: HashMap<String, usize>,
}

// --- recording ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RecordStatus {
    #[serde(rename = "outputActive", default)]
    pub active: bool,
    #[serde(rename = "outputPaused", default)]
    pub paused: bool,
    #[serde(rename = "outputTimecode", default)]
    pub timecode: Option<String>,
    #[serde(rename = "outputDuration", default)]
    pub duration: Option<i64>,
    #[serde(rename = "outputBytes", default)]
    pub bytes: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct RecordingInfo {
    pub recording: bool,
    pub paused: bool,
    pub duration: Option<i64>,
    pub timecode: Option<String>,
    pub bytes: u64,
}

// --- streaming ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StreamStatus {
    #[serde(rename = "outputActive", default)]
    pub active: bool,
    #[serde(rename = "outputReconnecting", default)]
    pub reconnecting: bool,
    #[serde(rename = "outputTimecode", default)]
    pub timecode: Option<String>,
    #[serde(rename = "outputDuration", default)]
    pub duration: i64,
    #[serde(rename = "outputBytes", default)]
    pub bytes: u64,
    #[serde(rename = "outputSkippedFrames", default)]
    pub skipped_frames: i64,
    #[serde(rename = "outputTotalFrames", default)]
    pub total_frames: i64,
    #[serde(rename = "outputCongestion", default)]
    pub congestion: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct StreamingInfo {
    pub streaming: bool,
    pub reconnecting: bool,
    pub duration: i64,
    pub timecode: String,
    pub bytes_sent: u64,
    pub dropped_frames: i64,
    pub total_frames: i64,
    pub congestion: f64,
    /// dropped/total as a percentage; 0 when nothing was sent yet
    pub drop_rate: f64,
}

// --- virtual camera ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VirtualCamStatus {
    #[serde(rename = "outputActive", default)]
    pub active: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct VirtualCameraInfo {
    pub active: bool,
}

// --- scene items ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SceneItemEntry {
    #[serde(rename = "sceneItemId", default)]
    pub scene_item_id: i64,
    #[serde(rename = "sourceName", default)]
    pub source_name: String,
    #[serde(rename = "sceneItemEnabled", default)]
    pub scene_item_enabled: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct SceneItemsInfo {
    pub scene_name: String,
    pub total_items: usize,
    pub enabled_items: usize,
    pub disabled_items: usize,
    pub items: Vec<SceneItemEntry>,
}

// --- sources ---

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct SourcesInfo {
    pub total_sources: usize,
    pub source_names: Vec<String>,
    pub source_types: HashMap<String, usize>,
    pub available_types: Vec<&'static str>,
}

// --- composite status snapshot ---

/// One-shot status across all modules; fields stay `None` for modules
/// whose query failed or when not connected.
#[derive(Serialize, Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub version: Option<Value>,
    pub recording: Option<RecordingInfo>,
    pub streaming: Option<StreamingInfo>,
    pub scenes: Option<SceneInfo>,
    pub inputs: Option<InputsInfo>,
    pub virtual_camera: Option<VirtualCameraInfo>,
    pub sources: Option<SourcesInfo>,
    pub error: Option<String>,
}

// --- input-kind JSON snapshot (persisted artifact) ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SnapshotMetadata {
    pub timestamp: String,
    pub total_kinds: usize,
    pub current_inputs_count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SnapshotCategories {
    pub audio: Vec<String>,
    pub video_media: Vec<String>,
    pub capture: Vec<String>,
    pub other: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SnapshotKinds {
    pub versioned: Vec<String>,
    pub unversioned: Vec<String>,
    pub by_category: SnapshotCategories,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SnapshotStatistics {
    pub audio_types_count: usize,
    pub video_types_count: usize,
    pub capture_types_count: usize,
    pub other_types_count: usize,
}

/// Schema of the `save_input_kinds_to_json` export file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InputKindSnapshot {
    pub metadata: SnapshotMetadata,
    pub input_kinds: SnapshotKinds,
    pub current_inputs: Vec<String>,
    pub statistics: SnapshotStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_status_defaults_missing_fields() {
        let status: RecordStatus = serde_json::from_value(json!({})).unwrap();
        assert!(!status.active);
        assert!(!status.paused);
        assert_eq!(status.duration, None);
        assert_eq!(status.bytes, 0);

        let status: RecordStatus = serde_json::from_value(json!({
            "outputActive": true,
            "outputTimecode": "00:01:02.345",
            "outputDuration": 62345,
            "outputBytes": 1048576,
        }))
        .unwrap();
        assert!(status.active);
        assert_eq!(status.timecode.as_deref(), Some("00:01:02.345"));
        assert_eq!(status.duration, Some(62345));
    }

    #[test]
    fn scene_entries_ignore_unknown_fields() {
        let entries: Vec<SceneEntry> = serde_json::from_value(json!([
            {"sceneName": "Game", "sceneIndex": 1, "somethingNew": true},
            {"sceneName": "Intermission", "sceneIndex": 0},
        ]))
        .unwrap();
        assert_eq!(entries[0].scene_name, "Game");
        assert_eq!(entries[1].scene_index, 0);
    }

    #[test]
    fn stream_status_round_trips_the_protocol_names() {
        let status: StreamStatus = serde_json::from_value(json!({
            "outputActive": true,
            "outputReconnecting": false,
            "outputSkippedFrames": 12,
            "outputTotalFrames": 2400,
            "outputCongestion": 0.25,
        }))
        .unwrap();
        assert!(status.active);
        assert_eq!(status.skipped_frames, 12);
        assert_eq!(status.total_frames, 2400);
        assert!((status.congestion - 0.25).abs() < f64::EPSILON);
    }
}
