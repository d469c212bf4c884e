//! Input operations: listing, mute control, settings, lifecycle and
//! the input-kind JSON snapshot export.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value};

use crate::client::ObsClient;
use crate::errors::ObsError;
use crate::protocol::response_data;
use crate::types::input_kinds;
use crate::types::responses::{
    CreatedInput, InputEntry, InputsInfo, SnapshotCategories, SnapshotKinds, SnapshotMetadata,
    SnapshotStatistics, SpecialInputs, InputKindSnapshot,
};

use super::{data_str, or_default_on_rejection, require_non_empty};

/// Kind substrings that mark an input as an audio device.
const AUDIO_KIND_KEYWORDS: &[&str] = &["audio", "mic", "wasapi", "pulse", "alsa", "coreaudio"];

/// Where the snapshot export lands when no path is given.
const DEFAULT_SNAPSHOT_PATH: &str = "download/input_kinds.json";

/// Parameters for creating an input inside a scene. The target is
/// addressed by scene name or scene uuid, never both.
#[derive(Debug, Clone)]
pub struct NewInput {
    pub input_name: String,
    pub input_kind: String,
    pub scene_name: Option<String>,
    pub scene_uuid: Option<String>,
    pub input_settings: Option<Value>,
    pub scene_item_enabled: bool,
    pub check_duplicates: bool,
}

impl NewInput {
    pub fn new(input_name: impl Into<String>, input_kind: impl Into<String>) -> Self {
        Self {
            input_name: input_name.into(),
            input_kind: input_kind.into(),
            scene_name: None,
            scene_uuid: None,
            input_settings: None,
            scene_item_enabled: true,
            check_duplicates: true,
        }
    }

    pub fn in_scene(mut self, scene_name: impl Into<String>) -> Self {
        self.scene_name = Some(scene_name.into());
        self
    }

    pub fn in_scene_uuid(mut self, scene_uuid: impl Into<String>) -> Self {
        self.scene_uuid = Some(scene_uuid.into());
        self
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.input_settings = Some(settings);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.scene_item_enabled = enabled;
        self
    }

    pub fn with_duplicate_check(mut self, check: bool) -> Self {
        self.check_duplicates = check;
        self
    }
}

pub struct InputManager {
    client: Arc<ObsClient>,
}

impl InputManager {
    pub fn new(client: Arc<ObsClient>) -> Self {
        Self { client }
    }

    /// Every input of the collection, across all scenes.
    pub fn get_all(&self) -> Result<Vec<InputEntry>, ObsError> {
        let data = response_data(&self.client.call("GetInputList", None)?);
        let inputs = data.get("inputs").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(inputs)?)
    }

    pub fn get_names(&self) -> Result<Vec<String>, ObsError> {
        Ok(self
            .get_all()?
            .into_iter()
            .map(|input| input.input_name)
            .collect())
    }

    /// Input kinds the application supports (not the inputs the user
    /// created). `unversioned` strips the version suffixes.
    pub fn get_input_kinds(&self, unversioned: bool) -> Result<Vec<String>, ObsError> {
        let result = self
            .client
            .call(
                "GetInputKindList",
                Some(json!({ "unversioned": unversioned })),
            )
            .map(|response| {
                let data = response_data(&response);
                data.get("inputKinds")
                    .and_then(|kinds| serde_json::from_value(kinds.clone()).ok())
                    .unwrap_or_default()
            });
        or_default_on_rejection(result, Vec::new())
    }

    /// The fixed desktop-audio and microphone slots.
    pub fn get_special_inputs(&self) -> Result<SpecialInputs, ObsError> {
        let result = self.client.call("GetSpecialInputs", None).map(|response| {
            let data = response_data(&response);
            SpecialInputs {
                desktop1: data_str(&data, "desktop1"),
                desktop2: data_str(&data, "desktop2"),
                mic1: data_str(&data, "mic1"),
                mic2: data_str(&data, "mic2"),
                mic3: data_str(&data, "mic3"),
                mic4: data_str(&data, "mic4"),
            }
        });
        or_default_on_rejection(result, SpecialInputs::default())
    }

    /// Names of inputs whose kind looks like an audio device.
    pub fn get_audio_inputs(&self) -> Result<Vec<String>, ObsError> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|input| {
                let kind = input.input_kind.to_lowercase();
                AUDIO_KIND_KEYWORDS
                    .iter()
                    .any(|keyword| kind.contains(keyword))
            })
            .map(|input| input.input_name)
            .collect())
    }

    pub fn exists(&self, input_name: &str) -> Result<bool, ObsError> {
        Ok(self.get_names()?.iter().any(|name| name == input_name))
    }

    pub fn is_muted(&self, input_name: &str) -> Result<bool, ObsError> {
        require_non_empty(input_name, "input name")?;
        self.ensure_exists(input_name)?;
        let data = response_data(
            &self
                .client
                .call("GetInputMute", Some(json!({ "inputName": input_name })))?,
        );
        Ok(super::data_bool(&data, "inputMuted"))
    }

    pub fn mute(&self, input_name: &str) -> Result<(), ObsError> {
        self.set_muted(input_name, true)
    }

    pub fn unmute(&self, input_name: &str) -> Result<(), ObsError> {
        self.set_muted(input_name, false)
    }

    fn set_muted(&self, input_name: &str, muted: bool) -> Result<(), ObsError> {
        require_non_empty(input_name, "input name")?;
        self.ensure_exists(input_name)?;
        self.client.call(
            "SetInputMute",
            Some(json!({ "inputName": input_name, "inputMuted": muted })),
        )?;
        info!(
            "input '{input_name}' {}",
            if muted { "muted" } else { "unmuted" }
        );
        Ok(())
    }

    /// Toggles and returns the new mute state. One round trip; the
    /// negation happens server-side so two concurrent callers cannot
    /// both act on a stale reading.
    pub fn toggle_mute(&self, input_name: &str) -> Result<bool, ObsError> {
        require_non_empty(input_name, "input name")?;
        self.ensure_exists(input_name)?;
        let data = response_data(
            &self
                .client
                .call("ToggleInputMute", Some(json!({ "inputName": input_name })))?,
        );
        let muted = super::data_bool(&data, "inputMuted");
        info!(
            "input '{input_name}' toggled to {}",
            if muted { "muted" } else { "unmuted" }
        );
        Ok(muted)
    }

    pub fn get_settings(&self, input_name: &str) -> Result<Value, ObsError> {
        require_non_empty(input_name, "input name")?;
        self.ensure_exists(input_name)?;
        let data = response_data(
            &self
                .client
                .call("GetInputSettings", Some(json!({ "inputName": input_name })))?,
        );
        Ok(data.get("inputSettings").cloned().unwrap_or(json!({})))
    }

    pub fn set_settings(&self, input_name: &str, settings: Value) -> Result<(), ObsError> {
        require_non_empty(input_name, "input name")?;
        self.ensure_exists(input_name)?;
        self.client.call(
            "SetInputSettings",
            Some(json!({ "inputName": input_name, "inputSettings": settings })),
        )?;
        info!("updated settings of input '{input_name}'");
        Ok(())
    }

    /// Defaults a freshly created input of `input_kind` would get.
    pub fn get_input_default_settings(&self, input_kind: &str) -> Result<Value, ObsError> {
        require_non_empty(input_kind, "input kind")?;
        let result = self.client.call(
            "GetInputDefaultSettings",
            Some(json!({ "inputKind": input_kind.trim() })),
        );
        match result {
            Ok(response) => Ok(response_data(&response)
                .get("defaultInputSettings")
                .cloned()
                .unwrap_or(json!({}))),
            Err(ObsError::RequestFailed { code: 600, .. }) => Err(ObsError::ResourceNotFound {
                kind: "input kind",
                name: input_kind.to_string(),
                available: Vec::new(),
            }),
            Err(other) => Err(other),
        }
    }

    /// Creates an input and attaches it to a scene as a scene item.
    pub fn create_input(&self, new_input: &NewInput) -> Result<CreatedInput, ObsError> {
        require_non_empty(&new_input.input_name, "input name")?;
        require_non_empty(&new_input.input_kind, "input kind")?;
        if new_input.scene_name.is_some() == new_input.scene_uuid.is_some() {
            return Err(ObsError::InvalidParameter(
                "provide exactly one of scene name or scene uuid".to_string(),
            ));
        }

        if new_input.check_duplicates && self.exists(&new_input.input_name)? {
            return Err(ObsError::InvalidParameter(format!(
                "input '{}' already exists",
                new_input.input_name
            )));
        }

        let available_kinds = self.get_input_kinds(false)?;
        if !available_kinds.is_empty()
            && !available_kinds.iter().any(|k| k == &new_input.input_kind)
        {
            warn!(
                "input kind '{}' may not be supported by this instance",
                new_input.input_kind
            );
        }

        let mut params = json!({
            "inputName": new_input.input_name.trim(),
            "inputKind": new_input.input_kind.trim(),
            "sceneItemEnabled": new_input.scene_item_enabled,
        });
        if let Some(scene_name) = &new_input.scene_name {
            params["sceneName"] = json!(scene_name.trim());
        }
        if let Some(scene_uuid) = &new_input.scene_uuid {
            params["sceneUuid"] = json!(scene_uuid.trim());
        }
        if let Some(settings) = &new_input.input_settings {
            params["inputSettings"] = settings.clone();
        }

        debug!("creating input: {params}");
        let result = self.client.call("CreateInput", Some(params));
        let data = match result {
            Ok(response) => response_data(&response),
            Err(ObsError::RequestFailed { code: 600, .. }) => {
                return Err(ObsError::ResourceNotFound {
                    kind: "scene",
                    name: new_input
                        .scene_name
                        .clone()
                        .or_else(|| new_input.scene_uuid.clone())
                        .unwrap_or_default(),
                    available: Vec::new(),
                })
            }
            Err(other) => return Err(other),
        };

        let created = CreatedInput {
            input_name: new_input.input_name.clone(),
            input_kind: new_input.input_kind.clone(),
            input_uuid: data_str(&data, "inputUuid"),
            scene_item_id: super::data_i64(&data, "sceneItemId").unwrap_or_default(),
        };
        info!(
            "created input '{}' (uuid: {}, scene item id: {})",
            created.input_name, created.input_uuid, created.scene_item_id
        );
        Ok(created)
    }

    /// Removes an input by name or uuid (exactly one must be given).
    /// All scene items referencing it disappear with it.
    pub fn remove_input(
        &self,
        input_name: Option<&str>,
        input_uuid: Option<&str>,
    ) -> Result<(), ObsError> {
        let identifier = Self::one_identifier(input_name, input_uuid)?;
        let mut params = json!({});
        if let Some(name) = input_name {
            params["inputName"] = json!(name.trim());
        }
        if let Some(uuid) = input_uuid {
            params["inputUuid"] = json!(uuid.trim());
        }

        match self.client.call("RemoveInput", Some(params)) {
            Ok(_) => {
                info!("removed input '{identifier}'");
                Ok(())
            }
            Err(ObsError::RequestFailed { code: 600, .. }) => Err(ObsError::ResourceNotFound {
                kind: "input",
                name: identifier,
                available: Vec::new(),
            }),
            Err(other) => Err(other),
        }
    }

    /// Renames an input addressed by name or uuid (exactly one).
    pub fn rename_input(
        &self,
        new_input_name: &str,
        input_name: Option<&str>,
        input_uuid: Option<&str>,
    ) -> Result<(), ObsError> {
        require_non_empty(new_input_name, "new input name")?;
        let identifier = Self::one_identifier(input_name, input_uuid)?;

        if self.exists(new_input_name.trim())? {
            return Err(ObsError::InvalidParameter(format!(
                "input '{}' already exists",
                new_input_name.trim()
            )));
        }

        let mut params = json!({ "newInputName": new_input_name.trim() });
        if let Some(name) = input_name {
            params["inputName"] = json!(name.trim());
        }
        if let Some(uuid) = input_uuid {
            params["inputUuid"] = json!(uuid.trim());
        }

        match self.client.call("SetInputName", Some(params)) {
            Ok(_) => {
                info!("renamed input '{identifier}' to '{new_input_name}'");
                Ok(())
            }
            Err(ObsError::RequestFailed { code: 600, .. }) => Err(ObsError::ResourceNotFound {
                kind: "input",
                name: identifier,
                available: Vec::new(),
            }),
            Err(other) => Err(other),
        }
    }

    pub fn get_info(&self) -> Result<InputsInfo, ObsError> {
        let all_inputs = self.get_all()?;
        let audio_input_names = self.get_audio_inputs()?;
        let available_kinds = self.get_input_kinds(false)?;

        let mut audio_mute_status = HashMap::new();
        for input_name in &audio_input_names {
            audio_mute_status.insert(input_name.clone(), self.is_muted(input_name).ok());
        }

        let mut input_type_distribution: HashMap<String, usize> = HashMap::new();
        for input in &all_inputs {
            let kind = if input.input_kind.is_empty() {
                "unknown".to_string()
            } else {
                input.input_kind.clone()
            };
            *input_type_distribution.entry(kind).or_default() += 1;
        }

        Ok(InputsInfo {
            total_inputs: all_inputs.len(),
            audio_inputs: audio_input_names.len(),
            available_input_kinds: available_kinds.len(),
            input_names: all_inputs.into_iter().map(|i| i.input_name).collect(),
            audio_input_names,
            audio_mute_status,
            available_kinds,
            input_type_distribution,
        })
    }

    /// Writes the supported-kind / current-input snapshot. Returns the
    /// path the file landed at (default `download/input_kinds.json`).
    pub fn save_input_kinds_to_json(&self, filepath: Option<&Path>) -> Result<PathBuf, ObsError> {
        let filepath = filepath
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH));

        let versioned = self.get_input_kinds(false)?;
        let unversioned = self.get_input_kinds(true)?;
        let current_inputs = self.get_names()?;

        let mut by_category = SnapshotCategories::default();
        for kind in &versioned {
            let lowered = kind.to_lowercase();
            if lowered.contains("audio") || lowered.contains("wasapi") {
                by_category.audio.push(kind.clone());
            } else if lowered.contains("capture") {
                by_category.capture.push(kind.clone());
            } else if ["image", "video", "ffmpeg", "text", "browser", "color"]
                .iter()
                .any(|keyword| lowered.contains(keyword))
            {
                by_category.video_media.push(kind.clone());
            } else {
                by_category.other.push(kind.clone());
            }
        }

        let snapshot = InputKindSnapshot {
            metadata: SnapshotMetadata {
                timestamp: chrono::Local::now().to_rfc3339(),
                total_kinds: versioned.len(),
                current_inputs_count: current_inputs.len(),
            },
            statistics: SnapshotStatistics {
                audio_types_count: by_category.audio.len(),
                video_types_count: by_category.video_media.len(),
                capture_types_count: by_category.capture.len(),
                other_types_count: by_category.other.len(),
            },
            input_kinds: SnapshotKinds {
                versioned,
                unversioned,
                by_category,
            },
            current_inputs,
        };

        if let Some(parent) = filepath.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&filepath, serde_json::to_string_pretty(&snapshot)?)?;
        info!("input kind snapshot written to {}", filepath.display());
        Ok(filepath)
    }

    /// English kind id -> localized name, for every known kind.
    pub fn get_input_types_with_chinese(&self) -> HashMap<&'static str, &'static str> {
        input_kinds::all_mappings()
    }

    pub fn get_chinese_name<'a>(&self, input_kind: &'a str) -> &'a str {
        input_kinds::to_chinese(input_kind)
    }

    pub fn get_english_type<'a>(&self, chinese_name: &'a str) -> &'a str {
        input_kinds::to_english(chinese_name)
    }

    fn one_identifier(
        input_name: Option<&str>,
        input_uuid: Option<&str>,
    ) -> Result<String, ObsError> {
        match (input_name, input_uuid) {
            (Some(name), None) => Ok(name.to_string()),
            (None, Some(uuid)) => Ok(uuid.to_string()),
            _ => Err(ObsError::InvalidParameter(
                "provide exactly one of input name or input uuid".to_string(),
            )),
        }
    }

    fn ensure_exists(&self, input_name: &str) -> Result<Vec<String>, ObsError> {
        let names = self.get_names()?;
        if !names.iter().any(|name| name == input_name) {
            debug!("input '{input_name}' not in {names:?}");
            return Err(ObsError::ResourceNotFound {
                kind: "input",
                name: input_name.to_string(),
                available: names,
            });
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeReply, FakeState};
    use serde_json::json;

    fn input_list(names: &[(&str, &str)]) -> FakeReply {
        let inputs: Vec<_> = names
            .iter()
            .map(|(name, kind)| json!({"inputName": name, "inputKind": kind}))
            .collect();
        FakeReply::Respond(json!({ "inputs": inputs }))
    }

    fn manager(script: Vec<FakeReply>) -> (InputManager, Arc<FakeState>) {
        let (client, state) = testkit::client(script);
        client.connect().unwrap();
        (InputManager::new(Arc::new(client)), state)
    }

    #[test]
    fn mute_on_unknown_input_reports_the_available_names() {
        let (inputs, state) = manager(vec![input_list(&[
            ("A", "wasapi_input_capture"),
            ("B", "wasapi_output_capture"),
        ])]);

        match inputs.mute("C").unwrap_err() {
            ObsError::ResourceNotFound {
                kind,
                name,
                available,
            } => {
                assert_eq!(kind, "input");
                assert_eq!(name, "C");
                assert_eq!(available, vec!["A", "B"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // the mute request itself never went out
        assert!(state.requests().iter().all(|(t, _, _)| t != "SetInputMute"));
    }

    #[test]
    fn toggle_mute_returns_the_server_side_state() {
        let (inputs, state) = manager(vec![
            input_list(&[("Mic", "wasapi_input_capture")]),
            FakeReply::Respond(json!({ "inputMuted": true })),
        ]);

        assert!(inputs.toggle_mute("Mic").unwrap());
        assert_eq!(state.requests()[1].0, "ToggleInputMute");
    }

    #[test]
    fn audio_inputs_are_filtered_by_kind_keywords() {
        let (inputs, _state) = manager(vec![input_list(&[
            ("Mic", "wasapi_input_capture"),
            ("Cam", "dshow_input"),
            ("Desktop", "coreaudio_output_capture"),
            ("Browser", "browser_source"),
        ])]);

        assert_eq!(inputs.get_audio_inputs().unwrap(), vec!["Mic", "Desktop"]);
    }

    #[test]
    fn create_input_requires_exactly_one_scene_address() {
        let (inputs, state) = manager(vec![]);

        let both = NewInput::new("Overlay", "browser_source")
            .in_scene("Game")
            .in_scene_uuid("uuid-1");
        assert!(matches!(
            inputs.create_input(&both),
            Err(ObsError::InvalidParameter(_))
        ));

        let neither = NewInput::new("Overlay", "browser_source");
        assert!(matches!(
            inputs.create_input(&neither),
            Err(ObsError::InvalidParameter(_))
        ));
        assert_eq!(state.request_count(), 0);
    }

    #[test]
    fn create_input_rejects_duplicates_and_translates_the_response() {
        let (inputs, state) = manager(vec![
            input_list(&[("Existing", "browser_source")]),
            FakeReply::Respond(json!({ "inputKinds": ["browser_source"] })),
            FakeReply::Respond(json!({ "inputUuid": "u-42", "sceneItemId": 7 })),
        ]);

        // the duplicate is caught by the local pre-check (list fetch only)
        let duplicate = NewInput::new("Existing", "browser_source").in_scene("Game");
        match inputs.create_input(&duplicate) {
            Err(ObsError::InvalidParameter(_)) => (),
            other => panic!("unexpected result: {other:?}"),
        }

        let fresh = NewInput::new("Overlay", "browser_source")
            .in_scene("Game")
            .with_duplicate_check(false);
        let created = inputs.create_input(&fresh).unwrap();
        assert_eq!(created.input_uuid, "u-42");
        assert_eq!(created.scene_item_id, 7);
        let sent = state.requests();
        assert_eq!(sent.last().unwrap().0, "CreateInput");
        assert_eq!(sent.last().unwrap().1["sceneName"], "Game");
    }

    #[test]
    fn remove_input_maps_protocol_not_found_to_the_typed_error() {
        let (inputs, _state) = manager(vec![FakeReply::Reject {
            code: 600,
            comment: "No source was found by the name of `Ghost`.".to_string(),
        }]);

        match inputs.remove_input(Some("Ghost"), None).unwrap_err() {
            ObsError::ResourceNotFound { kind, name, .. } => {
                assert_eq!(kind, "input");
                assert_eq!(name, "Ghost");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn snapshot_export_writes_the_fixed_schema() {
        let (inputs, _state) = manager(vec![
            FakeReply::Respond(json!({ "inputKinds": [
                "wasapi_input_capture", "window_capture", "browser_source", "slideshow_v2",
            ]})),
            FakeReply::Respond(json!({ "inputKinds": [
                "wasapi_input_capture", "window_capture", "browser_source", "slideshow",
            ]})),
            input_list(&[("Mic", "wasapi_input_capture")]),
        ]);

        let dir = std::env::temp_dir().join(format!(
            "obs-control-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let path = dir.join("input_kinds.json");
        let written = inputs.save_input_kinds_to_json(Some(&path)).unwrap();
        assert_eq!(written, path);

        let raw = fs::read_to_string(&path).unwrap();
        let snapshot: InputKindSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.metadata.total_kinds, 4);
        assert_eq!(snapshot.metadata.current_inputs_count, 1);
        assert_eq!(snapshot.input_kinds.by_category.audio, vec!["wasapi_input_capture"]);
        assert_eq!(snapshot.input_kinds.by_category.capture, vec!["window_capture"]);
        assert_eq!(snapshot.input_kinds.by_category.video_media, vec!["browser_source"]);
        assert_eq!(snapshot.input_kinds.by_category.other, vec!["slideshow_v2"]);
        assert_eq!(snapshot.statistics.audio_types_count, 1);
        assert_eq!(snapshot.current_inputs, vec!["Mic"]);

        fs::remove_dir_all(&dir).ok();
    }
}
