//! Scene item operations: visibility, id lookup by source name and
//! transforms.

use std::sync::Arc;

use log::info;
use serde_json::{json, Value};

use crate::client::ObsClient;
use crate::errors::ObsError;
use crate::protocol::response_data;
use crate::types::responses::{SceneItemEntry, SceneItemsInfo};

use super::{or_default_on_rejection, require_non_empty};

pub struct SceneItemManager {
    client: Arc<ObsClient>,
}

impl SceneItemManager {
    pub fn new(client: Arc<ObsClient>) -> Self {
        Self { client }
    }

    pub fn get_list(&self, scene_name: &str) -> Result<Vec<SceneItemEntry>, ObsError> {
        require_non_empty(scene_name, "scene name")?;
        let result = self
            .client
            .call(
                "GetSceneItemList",
                Some(json!({ "sceneName": scene_name })),
            )
            .map(|response| {
                let data = response_data(&response);
                data.get("sceneItems")
                    .and_then(|items| serde_json::from_value(items.clone()).ok())
                    .unwrap_or_default()
            });
        or_default_on_rejection(result, Vec::new())
    }

    /// Scene item id of `source_name` inside `scene_name`; `None` when
    /// the scene has no item for that source.
    pub fn get_id(&self, scene_name: &str, source_name: &str) -> Result<Option<i64>, ObsError> {
        require_non_empty(scene_name, "scene name")?;
        require_non_empty(source_name, "source name")?;
        let result = self
            .client
            .call(
                "GetSceneItemId",
                Some(json!({ "sceneName": scene_name, "sourceName": source_name })),
            )
            .map(|response| super::data_i64(&response_data(&response), "sceneItemId"));
        or_default_on_rejection(result, None)
    }

    pub fn is_enabled(&self, scene_name: &str, item_id: i64) -> Result<bool, ObsError> {
        require_non_empty(scene_name, "scene name")?;
        let result = self
            .client
            .call(
                "GetSceneItemEnabled",
                Some(json!({ "sceneName": scene_name, "sceneItemId": item_id })),
            )
            .map(|response| super::data_bool(&response_data(&response), "sceneItemEnabled"));
        or_default_on_rejection(result, false)
    }

    pub fn set_enabled(
        &self,
        scene_name: &str,
        item_id: i64,
        enabled: bool,
    ) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        self.client.call(
            "SetSceneItemEnabled",
            Some(json!({
                "sceneName": scene_name,
                "sceneItemId": item_id,
                "sceneItemEnabled": enabled,
            })),
        )?;
        info!(
            "scene item {item_id} in '{scene_name}' {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn show(&self, scene_name: &str, item_id: i64) -> Result<(), ObsError> {
        self.set_enabled(scene_name, item_id, true)
    }

    pub fn hide(&self, scene_name: &str, item_id: i64) -> Result<(), ObsError> {
        self.set_enabled(scene_name, item_id, false)
    }

    /// Flips the item's visibility and returns the new state.
    pub fn toggle(&self, scene_name: &str, item_id: i64) -> Result<bool, ObsError> {
        let enabled = !self.is_enabled(scene_name, item_id)?;
        self.set_enabled(scene_name, item_id, enabled)?;
        Ok(enabled)
    }

    pub fn show_by_source_name(
        &self,
        scene_name: &str,
        source_name: &str,
    ) -> Result<(), ObsError> {
        let item_id = self.require_id(scene_name, source_name)?;
        self.show(scene_name, item_id)
    }

    pub fn hide_by_source_name(
        &self,
        scene_name: &str,
        source_name: &str,
    ) -> Result<(), ObsError> {
        let item_id = self.require_id(scene_name, source_name)?;
        self.hide(scene_name, item_id)
    }

    pub fn toggle_by_source_name(
        &self,
        scene_name: &str,
        source_name: &str,
    ) -> Result<bool, ObsError> {
        let item_id = self.require_id(scene_name, source_name)?;
        self.toggle(scene_name, item_id)
    }

    /// Position/scale/crop information of one item.
    pub fn get_transform(&self, scene_name: &str, item_id: i64) -> Result<Value, ObsError> {
        require_non_empty(scene_name, "scene name")?;
        let data = response_data(&self.client.call(
            "GetSceneItemTransform",
            Some(json!({ "sceneName": scene_name, "sceneItemId": item_id })),
        )?);
        Ok(data
            .get("sceneItemTransform")
            .cloned()
            .unwrap_or(json!({})))
    }

    pub fn set_transform(
        &self,
        scene_name: &str,
        item_id: i64,
        transform: Value,
    ) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        self.client.call(
            "SetSceneItemTransform",
            Some(json!({
                "sceneName": scene_name,
                "sceneItemId": item_id,
                "sceneItemTransform": transform,
            })),
        )?;
        info!("updated transform of scene item {item_id} in '{scene_name}'");
        Ok(())
    }

    pub fn get_info(&self, scene_name: &str) -> Result<SceneItemsInfo, ObsError> {
        let items = self.get_list(scene_name)?;
        let enabled_items = items.iter().filter(|item| item.scene_item_enabled).count();
        Ok(SceneItemsInfo {
            scene_name: scene_name.to_string(),
            total_items: items.len(),
            enabled_items,
            disabled_items: items.len() - enabled_items,
            items,
        })
    }

    /// Id lookup that fails with the scene's source names attached
    /// when the source has no item in the scene.
    fn require_id(&self, scene_name: &str, source_name: &str) -> Result<i64, ObsError> {
        match self.get_id(scene_name, source_name)? {
            Some(item_id) => Ok(item_id),
            None => {
                let available = self
                    .get_list(scene_name)?
                    .into_iter()
                    .map(|item| item.source_name)
                    .collect();
                Err(ObsError::ResourceNotFound {
                    kind: "scene item",
                    name: source_name.to_string(),
                    available,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeReply, FakeState};
    use serde_json::json;

    fn manager(script: Vec<FakeReply>) -> (SceneItemManager, Arc<FakeState>) {
        let (client, state) = testkit::client(script);
        client.connect().unwrap();
        (SceneItemManager::new(Arc::new(client)), state)
    }

    #[test]
    fn toggle_reads_then_writes_the_opposite_state() {
        let (items, state) = manager(vec![
            FakeReply::Respond(json!({ "sceneItemEnabled": true })),
            FakeReply::Respond(json!({})),
        ]);

        let enabled = items.toggle("Game", 4).unwrap();
        assert!(!enabled);
        let sent = state.requests();
        assert_eq!(sent[0].0, "GetSceneItemEnabled");
        assert_eq!(sent[1].0, "SetSceneItemEnabled");
        assert_eq!(sent[1].1["sceneItemEnabled"], false);
    }

    #[test]
    fn missing_source_reports_the_scene_contents() {
        let (items, _state) = manager(vec![
            FakeReply::Reject {
                code: 600,
                comment: "No scene items were found".to_string(),
            },
            FakeReply::Respond(json!({ "sceneItems": [
                {"sceneItemId": 1, "sourceName": "Webcam", "sceneItemEnabled": true},
                {"sceneItemId": 2, "sourceName": "Overlay", "sceneItemEnabled": false},
            ]})),
        ]);

        match items.show_by_source_name("Game", "Ghost").unwrap_err() {
            ObsError::ResourceNotFound {
                kind,
                name,
                available,
            } => {
                assert_eq!(kind, "scene item");
                assert_eq!(name, "Ghost");
                assert_eq!(available, vec!["Webcam", "Overlay"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn info_counts_enabled_and_disabled_items() {
        let (items, _state) = manager(vec![FakeReply::Respond(json!({ "sceneItems": [
            {"sceneItemId": 1, "sourceName": "Webcam", "sceneItemEnabled": true},
            {"sceneItemId": 2, "sourceName": "Overlay", "sceneItemEnabled": false},
            {"sceneItemId": 3, "sourceName": "Alerts", "sceneItemEnabled": true},
        ]}))]);

        let info = items.get_info("Game").unwrap();
        assert_eq!(info.total_items, 3);
        assert_eq!(info.enabled_items, 2);
        assert_eq!(info.disabled_items, 1);
    }
}
