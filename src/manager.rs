//! The aggregate entry point: one shared client plus every manager,
//! with the most common operations re-exposed as flat convenience
//! methods.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::error;
use serde_json::Value;

use crate::client::ObsClient;
use crate::config::ObsConfig;
use crate::errors::ObsError;
use crate::events::{ListenerId, ObsEvent};
use crate::managers::{
    InputManager, NewInput, RecordingManager, SceneItemManager, SceneManager, SourceManager,
    StreamingManager, VirtualCameraManager,
};
use crate::types::responses::{CreatedInput, SceneItemEntry, StatusSnapshot};

/// Aggregates the client and the per-module managers behind one
/// object. The client's session is torn down when the manager (and
/// with it the last clone of the client handle) is dropped, so a scope
/// that panics still ends Disconnected.
pub struct ObsManager {
    client: Arc<ObsClient>,
    pub scenes: SceneManager,
    pub inputs: InputManager,
    pub recording: RecordingManager,
    pub streaming: StreamingManager,
    pub virtual_camera: VirtualCameraManager,
    pub scene_items: SceneItemManager,
    pub sources: SourceManager,
}

impl ObsManager {
    /// Builds the manager; when the config's `auto_connect` is set the
    /// session is opened right away.
    pub fn new(config: ObsConfig) -> Result<Self, ObsError> {
        let auto_connect = config.auto_connect;
        let manager = Self::with_client(Arc::new(ObsClient::new(config)?));
        if auto_connect {
            manager.connect()?;
        }
        Ok(manager)
    }

    /// Wraps an existing client without touching its connection state.
    pub fn with_client(client: Arc<ObsClient>) -> Self {
        Self {
            scenes: SceneManager::new(Arc::clone(&client)),
            inputs: InputManager::new(Arc::clone(&client)),
            recording: RecordingManager::new(Arc::clone(&client)),
            streaming: StreamingManager::new(Arc::clone(&client)),
            virtual_camera: VirtualCameraManager::new(Arc::clone(&client)),
            scene_items: SceneItemManager::new(Arc::clone(&client)),
            sources: SourceManager::new(Arc::clone(&client)),
            client,
        }
    }

    pub fn client(&self) -> &Arc<ObsClient> {
        &self.client
    }

    pub fn connect(&self) -> Result<(), ObsError> {
        self.client.connect()
    }

    pub fn disconnect(&self) {
        self.client.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn get_version(&self) -> Result<Value, ObsError> {
        self.client.get_version()
    }

    pub fn get_stats(&self) -> Result<Value, ObsError> {
        self.client.get_stats()
    }

    /// One snapshot across every module. Fields stay `None` when not
    /// connected or when that module's query failed; the first failure
    /// is recorded in `error`.
    pub fn get_status(&self) -> StatusSnapshot {
        if !self.is_connected() {
            return StatusSnapshot {
                connected: false,
                error: Some("not connected to OBS".to_string()),
                ..StatusSnapshot::default()
            };
        }

        let mut snapshot = StatusSnapshot {
            connected: true,
            ..StatusSnapshot::default()
        };
        let mut first_error: Option<String> = None;
        let mut record = |error: ObsError| {
            error!("status query failed: {error}");
            if first_error.is_none() {
                first_error = Some(error.to_string());
            }
        };

        match self.get_version() {
            Ok(version) => snapshot.version = Some(version),
            Err(e) => record(e),
        }
        match self.recording.get_info() {
            Ok(info) => snapshot.recording = Some(info),
            Err(e) => record(e),
        }
        match self.streaming.get_info() {
            Ok(info) => snapshot.streaming = Some(info),
            Err(e) => record(e),
        }
        match self.scenes.get_info() {
            Ok(info) => snapshot.scenes = Some(info),
            Err(e) => record(e),
        }
        match self.inputs.get_info() {
            Ok(info) => snapshot.inputs = Some(info),
            Err(e) => record(e),
        }
        match self.virtual_camera.get_info() {
            Ok(info) => snapshot.virtual_camera = Some(info),
            Err(e) => record(e),
        }
        match self.sources.get_info() {
            Ok(info) => snapshot.sources = Some(info),
            Err(e) => record(e),
        }
        drop(record);
        snapshot.error = first_error;
        snapshot
    }

    pub fn register_event_callback<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ObsEvent) + Send + Sync + 'static,
    {
        self.client.register_event_callback(callback)
    }

    pub fn register_event_callback_for<F>(&self, event_type: &str, callback: F) -> ListenerId
    where
        F: Fn(&ObsEvent) + Send + Sync + 'static,
    {
        self.client.register_event_callback_for(event_type, callback)
    }

    pub fn unregister_event_callback(&self, id: ListenerId) {
        self.client.unregister_event_callback(id)
    }

    // --- recording convenience ---

    pub fn start_recording(
        &self,
        output_directory: Option<&Path>,
        filename: Option<&str>,
    ) -> Result<(), ObsError> {
        self.recording.start(output_directory, filename)
    }

    pub fn stop_recording(&self) -> Result<PathBuf, ObsError> {
        self.recording.stop()
    }

    pub fn is_recording(&self) -> Result<bool, ObsError> {
        self.recording.is_recording()
    }

    pub fn toggle_recording(&self) -> Result<bool, ObsError> {
        self.recording.toggle()
    }

    pub fn quick_record(
        &self,
        duration: Duration,
        output_directory: Option<&Path>,
        filename: Option<&str>,
    ) -> Result<PathBuf, ObsError> {
        self.recording.quick_record(duration, output_directory, filename)
    }

    pub fn set_recording_directory(&self, directory: &Path) -> Result<bool, ObsError> {
        self.recording.set_output_directory(directory)
    }

    pub fn get_recording_directory(&self) -> Result<Option<PathBuf>, ObsError> {
        self.recording.get_output_directory()
    }

    // --- streaming convenience ---

    pub fn start_streaming(&self) -> Result<(), ObsError> {
        self.streaming.start()
    }

    pub fn stop_streaming(&self) -> Result<(), ObsError> {
        self.streaming.stop()
    }

    pub fn is_streaming(&self) -> Result<bool, ObsError> {
        self.streaming.is_streaming()
    }

    pub fn toggle_streaming(&self) -> Result<bool, ObsError> {
        self.streaming.toggle()
    }

    // --- scene convenience ---

    pub fn get_scenes(&self) -> Result<Vec<String>, ObsError> {
        self.scenes.get_names()
    }

    pub fn get_current_scene(&self) -> Result<String, ObsError> {
        self.scenes.get_current_program()
    }

    pub fn switch_scene(&self, scene_name: &str) -> Result<(), ObsError> {
        self.scenes.switch_to(scene_name)
    }

    pub fn create_scene(&self, scene_name: &str) -> Result<(), ObsError> {
        self.scenes.create(scene_name)
    }

    pub fn delete_scene(&self, scene_name: &str) -> Result<(), ObsError> {
        self.scenes.delete(scene_name)
    }

    pub fn enable_studio_mode(&self, enabled: bool) -> Result<(), ObsError> {
        self.scenes.enable_studio_mode(enabled)
    }

    pub fn trigger_transition(&self) -> Result<(), ObsError> {
        self.scenes.trigger_transition()
    }

    // --- input convenience ---

    pub fn get_inputs(&self) -> Result<Vec<String>, ObsError> {
        self.inputs.get_names()
    }

    pub fn get_audio_inputs(&self) -> Result<Vec<String>, ObsError> {
        self.inputs.get_audio_inputs()
    }

    pub fn get_input_kinds(&self, unversioned: bool) -> Result<Vec<String>, ObsError> {
        self.inputs.get_input_kinds(unversioned)
    }

    pub fn mute_input(&self, input_name: &str) -> Result<(), ObsError> {
        self.inputs.mute(input_name)
    }

    pub fn unmute_input(&self, input_name: &str) -> Result<(), ObsError> {
        self.inputs.unmute(input_name)
    }

    pub fn toggle_input_mute(&self, input_name: &str) -> Result<bool, ObsError> {
        self.inputs.toggle_mute(input_name)
    }

    pub fn is_input_muted(&self, input_name: &str) -> Result<bool, ObsError> {
        self.inputs.is_muted(input_name)
    }

    pub fn create_input(&self, new_input: &NewInput) -> Result<CreatedInput, ObsError> {
        self.inputs.create_input(new_input)
    }

    pub fn save_input_kinds(&self, filepath: Option<&Path>) -> Result<PathBuf, ObsError> {
        self.inputs.save_input_kinds_to_json(filepath)
    }

    // --- virtual camera convenience ---

    pub fn start_virtual_camera(&self) -> Result<(), ObsError> {
        self.virtual_camera.start()
    }

    pub fn stop_virtual_camera(&self) -> Result<(), ObsError> {
        self.virtual_camera.stop()
    }

    pub fn is_virtual_camera_active(&self) -> Result<bool, ObsError> {
        self.virtual_camera.is_active()
    }

    pub fn toggle_virtual_camera(&self) -> Result<bool, ObsError> {
        self.virtual_camera.toggle()
    }

    // --- scene item convenience ---

    pub fn show_scene_item(&self, scene_name: &str, source_name: &str) -> Result<(), ObsError> {
        self.scene_items.show_by_source_name(scene_name, source_name)
    }

    pub fn hide_scene_item(&self, scene_name: &str, source_name: &str) -> Result<(), ObsError> {
        self.scene_items.hide_by_source_name(scene_name, source_name)
    }

    pub fn toggle_scene_item(
        &self,
        scene_name: &str,
        source_name: &str,
    ) -> Result<bool, ObsError> {
        self.scene_items.toggle_by_source_name(scene_name, source_name)
    }

    pub fn get_scene_items(&self, scene_name: &str) -> Result<Vec<SceneItemEntry>, ObsError> {
        self.scene_items.get_list(scene_name)
    }

    // --- source convenience ---

    pub fn get_sources(&self) -> Result<Vec<String>, ObsError> {
        self.sources.get_names()
    }

    pub fn source_exists(&self, source_name: &str) -> Result<bool, ObsError> {
        self.sources.exists(source_name)
    }

    pub fn create_text_source(
        &self,
        source_name: &str,
        text: &str,
        font_size: u32,
        color: u32,
    ) -> Result<(), ObsError> {
        self.sources.create_text_source(source_name, text, font_size, color)
    }

    pub fn create_image_source(&self, source_name: &str, file_path: &str) -> Result<(), ObsError> {
        self.sources.create_image_source(source_name, file_path)
    }

    pub fn create_video_source(
        &self,
        source_name: &str,
        file_path: &str,
        looping: bool,
    ) -> Result<(), ObsError> {
        self.sources.create_video_source(source_name, file_path, looping)
    }

    pub fn create_color_source(
        &self,
        source_name: &str,
        color: u32,
        width: u32,
        height: u32,
    ) -> Result<(), ObsError> {
        self.sources.create_color_source(source_name, color, width, height)
    }

    pub fn create_browser_source(
        &self,
        source_name: &str,
        url: &str,
        width: u32,
        height: u32,
    ) -> Result<(), ObsError> {
        self.sources.create_browser_source(source_name, url, width, height)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_text_source_in_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        text: &str,
        font_size: u32,
        color: u32,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        self.sources.create_text_source_in_scene(
            scene_name,
            source_name,
            text,
            font_size,
            color,
            position,
            scale,
        )
    }

    pub fn create_image_source_in_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        file_path: &str,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        self.sources
            .create_image_source_in_scene(scene_name, source_name, file_path, position, scale)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_video_source_in_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        file_path: &str,
        looping: bool,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        self.sources.create_video_source_in_scene(
            scene_name,
            source_name,
            file_path,
            looping,
            position,
            scale,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_color_source_in_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        color: u32,
        width: u32,
        height: u32,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        self.sources.create_color_source_in_scene(
            scene_name,
            source_name,
            color,
            width,
            height,
            position,
            scale,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_browser_source_in_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        url: &str,
        width: u32,
        height: u32,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        self.sources.create_browser_source_in_scene(
            scene_name,
            source_name,
            url,
            width,
            height,
            position,
            scale,
        )
    }

    pub fn delete_source(&self, source_name: &str) -> Result<(), ObsError> {
        self.sources.delete_source(source_name)
    }

    pub fn set_text_content(&self, source_name: &str, text: &str) -> Result<(), ObsError> {
        self.sources.set_text_content(source_name, text)
    }

    pub fn set_image_path(&self, source_name: &str, file_path: &str) -> Result<(), ObsError> {
        self.sources.set_image_path(source_name, file_path)
    }

    pub fn set_video_path(&self, source_name: &str, file_path: &str) -> Result<(), ObsError> {
        self.sources.set_video_path(source_name, file_path)
    }

    pub fn add_source_to_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        self.sources
            .add_source_to_scene(scene_name, source_name, position, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeReply};
    use serde_json::json;

    #[test]
    fn facade_routes_through_the_shared_client() {
        let (client, state) = testkit::client(vec![
            FakeReply::Respond(json!({ "scenes": [{"sceneName": "Game"}] })),
            FakeReply::Respond(json!({})),
        ]);
        client.connect().unwrap();
        let manager = ObsManager::with_client(Arc::new(client));

        manager.switch_scene("Game").unwrap();
        assert_eq!(state.requests()[1].0, "SetCurrentProgramScene");
        assert!(manager.is_connected());
        manager.disconnect();
        assert!(!manager.is_connected());
    }

    #[test]
    fn status_is_marked_disconnected_without_a_session() {
        let (client, _state) = testkit::client(vec![]);
        let manager = ObsManager::with_client(Arc::new(client));
        let status = manager.get_status();
        assert!(!status.connected);
        assert!(status.version.is_none());
        assert!(status.error.is_some());
    }

    #[test]
    fn status_collects_module_summaries_when_connected() {
        // the status sweep issues its queries in a fixed order:
        // version, record, stream, scene list, program scene, preview,
        // studio mode, then the input and source sweeps
        let (client, _state) = testkit::client(vec![
            FakeReply::Respond(json!({ "obsVersion": "30.0.0" })),
            FakeReply::Respond(json!({ "outputActive": true })),
            FakeReply::Respond(json!({ "outputActive": false })),
        ]);
        client.connect().unwrap();
        let manager = ObsManager::with_client(Arc::new(client));

        let status = manager.get_status();
        assert!(status.connected);
        assert_eq!(status.version.unwrap()["obsVersion"], "30.0.0");
        assert!(status.recording.unwrap().recording);
        assert!(!status.streaming.unwrap().streaming);
        // the remaining queries ran against empty default responses
        assert_eq!(status.scenes.unwrap().total_scenes, 0);
    }
}
