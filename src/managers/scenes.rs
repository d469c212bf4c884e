//! Scene operations: listing, switching, studio mode, lifecycle and
//! per-scene transition overrides.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::json;

use crate::client::ObsClient;
use crate::errors::ObsError;
use crate::protocol::response_data;
use crate::types::responses::{SceneEntry, SceneInfo, TransitionOverride};

use super::{data_str, or_default_on_rejection, require_non_empty};

/// Valid range for a transition override duration, in milliseconds.
const TRANSITION_DURATION_RANGE: std::ops::RangeInclusive<i64> = 50..=20_000;

pub struct SceneManager {
    client: Arc<ObsClient>,
}

impl SceneManager {
    pub fn new(client: Arc<ObsClient>) -> Self {
        Self { client }
    }

    pub fn get_all(&self) -> Result<Vec<SceneEntry>, ObsError> {
        let data = response_data(&self.client.call("GetSceneList", None)?);
        let scenes = data.get("scenes").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(scenes)?)
    }

    pub fn get_names(&self) -> Result<Vec<String>, ObsError> {
        Ok(self
            .get_all()?
            .into_iter()
            .map(|scene| scene.scene_name)
            .collect())
    }

    /// Groups are renamed scenes under the hood; the protocol lists
    /// them separately.
    pub fn get_group_list(&self) -> Result<Vec<String>, ObsError> {
        let result = self.client.call("GetGroupList", None).map(|response| {
            let data = response_data(&response);
            data.get("groups")
                .and_then(|groups| serde_json::from_value(groups.clone()).ok())
                .unwrap_or_default()
        });
        or_default_on_rejection(result, Vec::new())
    }

    pub fn get_current_program(&self) -> Result<String, ObsError> {
        let data = response_data(&self.client.call("GetCurrentProgramScene", None)?);
        Ok(data_str(&data, "currentProgramSceneName"))
    }

    /// Preview scene name; empty when studio mode is disabled.
    pub fn get_current_preview(&self) -> Result<String, ObsError> {
        let result = self
            .client
            .call("GetCurrentPreviewScene", None)
            .map(|response| data_str(&response_data(&response), "currentPreviewSceneName"));
        or_default_on_rejection(result, String::new())
    }

    pub fn switch_to(&self, scene_name: &str) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        self.ensure_exists(scene_name)?;
        self.client.call(
            "SetCurrentProgramScene",
            Some(json!({ "sceneName": scene_name })),
        )?;
        info!("switched to scene '{scene_name}'");
        Ok(())
    }

    pub fn set_preview(&self, scene_name: &str) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        self.ensure_exists(scene_name)?;
        self.client.call(
            "SetCurrentPreviewScene",
            Some(json!({ "sceneName": scene_name })),
        )?;
        info!("preview scene set to '{scene_name}'");
        Ok(())
    }

    pub fn is_studio_mode_enabled(&self) -> Result<bool, ObsError> {
        let result = self
            .client
            .call("GetStudioModeEnabled", None)
            .map(|response| super::data_bool(&response_data(&response), "studioModeEnabled"));
        or_default_on_rejection(result, false)
    }

    pub fn enable_studio_mode(&self, enabled: bool) -> Result<(), ObsError> {
        self.client.call(
            "SetStudioModeEnabled",
            Some(json!({ "studioModeEnabled": enabled })),
        )?;
        info!(
            "studio mode {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn disable_studio_mode(&self) -> Result<(), ObsError> {
        self.enable_studio_mode(false)
    }

    pub fn trigger_transition(&self) -> Result<(), ObsError> {
        if !self.is_studio_mode_enabled()? {
            warn!("studio mode is not enabled; cannot trigger a transition");
            return Err(ObsError::Request(
                "studio mode is not enabled; cannot trigger a transition".to_string(),
            ));
        }
        self.client.call("TriggerStudioModeTransition", None)?;
        info!("studio mode transition triggered");
        Ok(())
    }

    pub fn exists(&self, scene_name: &str) -> Result<bool, ObsError> {
        Ok(self.get_names()?.iter().any(|name| name == scene_name))
    }

    pub fn create(&self, scene_name: &str) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        if self.exists(scene_name)? {
            warn!("scene '{scene_name}' already exists");
            return Err(ObsError::InvalidParameter(format!(
                "scene '{scene_name}' already exists"
            )));
        }
        self.client
            .call("CreateScene", Some(json!({ "sceneName": scene_name })))?;
        info!("created scene '{scene_name}'");
        Ok(())
    }

    pub fn delete(&self, scene_name: &str) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        self.ensure_exists(scene_name)?;
        self.client
            .call("RemoveScene", Some(json!({ "sceneName": scene_name })))?;
        info!("deleted scene '{scene_name}'");
        Ok(())
    }

    pub fn rename(&self, scene_name: &str, new_scene_name: &str) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        require_non_empty(new_scene_name, "new scene name")?;
        let names = self.ensure_exists(scene_name)?;
        if names.iter().any(|name| name == new_scene_name) {
            warn!("scene '{new_scene_name}' already exists");
            return Err(ObsError::InvalidParameter(format!(
                "scene '{new_scene_name}' already exists"
            )));
        }
        self.client.call(
            "SetSceneName",
            Some(json!({
                "sceneName": scene_name,
                "newSceneName": new_scene_name,
            })),
        )?;
        info!("renamed scene '{scene_name}' to '{new_scene_name}'");
        Ok(())
    }

    pub fn get_scene_transition_override(
        &self,
        scene_name: &str,
    ) -> Result<TransitionOverride, ObsError> {
        require_non_empty(scene_name, "scene name")?;
        self.ensure_exists(scene_name)?;
        let data = response_data(&self.client.call(
            "GetSceneSceneTransitionOverride",
            Some(json!({ "sceneName": scene_name })),
        )?);
        Ok(serde_json::from_value(data).unwrap_or_default())
    }

    /// Sets (or, with `None` values, removes) the per-scene transition
    /// override. The duration must lie within 50..=20000 ms; that is
    /// checked before anything is sent.
    pub fn set_scene_transition_override(
        &self,
        scene_name: &str,
        transition_name: Option<&str>,
        transition_duration: Option<i64>,
    ) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        if let Some(duration) = transition_duration {
            if !TRANSITION_DURATION_RANGE.contains(&duration) {
                return Err(ObsError::InvalidParameter(format!(
                    "transition duration must be within {}..={} ms, got {duration}",
                    TRANSITION_DURATION_RANGE.start(),
                    TRANSITION_DURATION_RANGE.end(),
                )));
            }
        }
        self.ensure_exists(scene_name)?;
        // explicit nulls clear the override on the server side
        self.client.call(
            "SetSceneSceneTransitionOverride",
            Some(json!({
                "sceneName": scene_name,
                "transitionName": transition_name,
                "transitionDuration": transition_duration,
            })),
        )?;
        info!("set transition override for scene '{scene_name}'");
        Ok(())
    }

    pub fn get_info(&self) -> Result<SceneInfo, ObsError> {
        let scene_names = self.get_names()?;
        Ok(SceneInfo {
            current_program: self.get_current_program()?,
            current_preview: self.get_current_preview()?,
            studio_mode: self.is_studio_mode_enabled()?,
            total_scenes: scene_names.len(),
            scene_names,
        })
    }

    /// Fetches the current scene list and fails with the available
    /// names attached when `scene_name` is not among them.
    fn ensure_exists(&self, scene_name: &str) -> Result<Vec<String>, ObsError> {
        let names = self.get_names()?;
        if !names.iter().any(|name| name == scene_name) {
            debug!("scene '{scene_name}' not in {names:?}");
            return Err(ObsError::ResourceNotFound {
                kind: "scene",
                name: scene_name.to_string(),
                available: names,
            });
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeReply};
    use serde_json::json;

    fn scene_list(names: &[&str]) -> FakeReply {
        let scenes: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| json!({"sceneName": name, "sceneIndex": i}))
            .collect();
        FakeReply::Respond(json!({ "scenes": scenes }))
    }

    fn manager(script: Vec<FakeReply>) -> (SceneManager, Arc<crate::testkit::FakeState>) {
        let (client, state) = testkit::client(script);
        client.connect().unwrap();
        (SceneManager::new(Arc::new(client)), state)
    }

    #[test]
    fn switch_to_checks_existence_first() {
        let (scenes, state) = manager(vec![scene_list(&["Game", "Intermission"])]);

        let err = scenes.switch_to("Ending").unwrap_err();
        match err {
            ObsError::ResourceNotFound {
                kind,
                name,
                available,
            } => {
                assert_eq!(kind, "scene");
                assert_eq!(name, "Ending");
                assert_eq!(available, vec!["Game", "Intermission"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // only the list fetch went out, never the switch
        let sent = state.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "GetSceneList");
    }

    #[test]
    fn switch_to_dispatches_when_the_scene_exists() {
        let (scenes, state) = manager(vec![
            scene_list(&["Game", "Intermission"]),
            FakeReply::Respond(json!({})),
        ]);

        scenes.switch_to("Game").unwrap();
        let sent = state.requests();
        assert_eq!(sent[1].0, "SetCurrentProgramScene");
        assert_eq!(sent[1].1["sceneName"], "Game");
    }

    #[test]
    fn transition_override_duration_is_validated_before_any_request() {
        let (scenes, state) = manager(vec![]);

        let err = scenes
            .set_scene_transition_override("Game", Some("Fade"), Some(25_000))
            .unwrap_err();
        assert!(matches!(err, ObsError::InvalidParameter(_)));
        assert_eq!(state.request_count(), 0);
    }

    #[test]
    fn transition_override_accepts_the_range_boundary() {
        let (scenes, state) = manager(vec![
            scene_list(&["Game"]),
            FakeReply::Respond(json!({})),
        ]);

        scenes
            .set_scene_transition_override("Game", Some("Fade"), Some(20_000))
            .unwrap();
        let sent = state.requests();
        assert_eq!(sent[1].0, "SetSceneSceneTransitionOverride");
        assert_eq!(sent[1].1["transitionDuration"], 20_000);
    }

    #[test]
    fn create_rejects_duplicates_locally() {
        let (scenes, state) = manager(vec![scene_list(&["Game"])]);

        let err = scenes.create("Game").unwrap_err();
        assert!(matches!(err, ObsError::InvalidParameter(_)));
        assert_eq!(state.request_count(), 1); // just the list fetch
    }

    #[test]
    fn empty_names_fail_before_the_wire() {
        let (scenes, state) = manager(vec![]);
        assert!(matches!(
            scenes.switch_to("  "),
            Err(ObsError::InvalidParameter(_))
        ));
        assert_eq!(state.request_count(), 0);
    }

    #[test]
    fn preview_degrades_to_empty_when_studio_mode_is_off() {
        let (scenes, _state) = manager(vec![FakeReply::Reject {
            code: 506,
            comment: "Studio mode is not active".to_string(),
        }]);
        assert_eq!(scenes.get_current_preview().unwrap(), "");
    }
}
