//! Source lifecycle: generic create/delete, settings access, typed
//! creators for the common kinds, and attaching sources to scenes.

use std::sync::Arc;

use log::{info, warn};
use serde_json::{json, Value};

use crate::client::ObsClient;
use crate::errors::ObsError;
use crate::protocol::response_data;
use crate::types::responses::{InputEntry, SourcesInfo};

use super::require_non_empty;

/// Friendly alias -> internal kind id for the commonly created kinds.
pub const SOURCE_KINDS: &[(&str, &str)] = &[
    ("text", "text_gdiplus_v2"),
    ("image", "image_source"),
    ("video", "ffmpeg_source"),
    ("audio", "ffmpeg_source"),
    ("window", "window_capture"),
    ("display", "monitor_capture"),
    ("camera", "dshow_input"),
    ("browser", "browser_source"),
    ("color", "color_source"),
];

fn kind_for(alias: &str) -> &'static str {
    SOURCE_KINDS
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, kind)| *kind)
        .expect("alias must be listed in SOURCE_KINDS")
}

pub struct SourceManager {
    client: Arc<ObsClient>,
}

impl SourceManager {
    pub fn new(client: Arc<ObsClient>) -> Self {
        Self { client }
    }

    pub fn get_all(&self) -> Result<Vec<InputEntry>, ObsError> {
        let data = response_data(&self.client.call("GetInputList", None)?);
        let inputs = data.get("inputs").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(inputs)?)
    }

    pub fn get_names(&self) -> Result<Vec<String>, ObsError> {
        Ok(self
            .get_all()?
            .into_iter()
            .map(|source| source.input_name)
            .collect())
    }

    pub fn exists(&self, source_name: &str) -> Result<bool, ObsError> {
        Ok(self.get_names()?.iter().any(|name| name == source_name))
    }

    /// Full listing entry for one source; `None` when it is unknown.
    pub fn get_source_info(&self, source_name: &str) -> Result<Option<InputEntry>, ObsError> {
        Ok(self
            .get_all()?
            .into_iter()
            .find(|source| source.input_name == source_name))
    }

    /// Creates a free-standing source (not attached to any scene).
    pub fn create_source(
        &self,
        source_name: &str,
        source_kind: &str,
        settings: Option<Value>,
    ) -> Result<(), ObsError> {
        require_non_empty(source_name, "source name")?;
        require_non_empty(source_kind, "source kind")?;
        if self.exists(source_name)? {
            warn!("source '{source_name}' already exists");
            return Err(ObsError::InvalidParameter(format!(
                "source '{source_name}' already exists"
            )));
        }

        self.client.call(
            "CreateInput",
            Some(json!({
                "inputName": source_name,
                "inputKind": source_kind,
                "inputSettings": settings.unwrap_or(json!({})),
            })),
        )?;
        info!("created source '{source_name}' ({source_kind})");
        Ok(())
    }

    pub fn delete_source(&self, source_name: &str) -> Result<(), ObsError> {
        require_non_empty(source_name, "source name")?;
        self.ensure_exists(source_name)?;
        self.client
            .call("RemoveInput", Some(json!({ "inputName": source_name })))?;
        info!("deleted source '{source_name}'");
        Ok(())
    }

    pub fn get_settings(&self, source_name: &str) -> Result<Value, ObsError> {
        require_non_empty(source_name, "source name")?;
        self.ensure_exists(source_name)?;
        let data = response_data(
            &self
                .client
                .call("GetInputSettings", Some(json!({ "inputName": source_name })))?,
        );
        Ok(data.get("inputSettings").cloned().unwrap_or(json!({})))
    }

    pub fn set_settings(&self, source_name: &str, settings: Value) -> Result<(), ObsError> {
        require_non_empty(source_name, "source name")?;
        self.ensure_exists(source_name)?;
        self.client.call(
            "SetInputSettings",
            Some(json!({ "inputName": source_name, "inputSettings": settings })),
        )?;
        info!("updated settings of source '{source_name}'");
        Ok(())
    }

    // --- typed creators (free-standing) ---

    pub fn create_text_source(
        &self,
        source_name: &str,
        text: &str,
        font_size: u32,
        color: u32,
    ) -> Result<(), ObsError> {
        self.create_source(source_name, kind_for("text"), Some(text_settings(text, font_size, color)))
    }

    pub fn create_image_source(&self, source_name: &str, file_path: &str) -> Result<(), ObsError> {
        self.create_source(source_name, kind_for("image"), Some(image_settings(file_path)))
    }

    pub fn create_video_source(
        &self,
        source_name: &str,
        file_path: &str,
        looping: bool,
    ) -> Result<(), ObsError> {
        self.create_source(
            source_name,
            kind_for("video"),
            Some(video_settings(file_path, looping)),
        )
    }

    pub fn create_color_source(
        &self,
        source_name: &str,
        color: u32,
        width: u32,
        height: u32,
    ) -> Result<(), ObsError> {
        self.create_source(
            source_name,
            kind_for("color"),
            Some(color_settings(color, width, height)),
        )
    }

    pub fn create_browser_source(
        &self,
        source_name: &str,
        url: &str,
        width: u32,
        height: u32,
    ) -> Result<(), ObsError> {
        self.create_source(
            source_name,
            kind_for("browser"),
            Some(browser_settings(url, width, height)),
        )
    }

    // --- typed creators attached to a scene ---

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
        self.create_and_add_to_scene(
            scene_name,
            source_name,
            kind_for("text"),
            Some(text_settings(text, font_size, color)),
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
        self.create_and_add_to_scene(
            scene_name,
            source_name,
            kind_for("image"),
            Some(image_settings(file_path)),
            position,
            scale,
        )
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
        self.create_and_add_to_scene(
            scene_name,
            source_name,
            kind_for("video"),
            Some(video_settings(file_path, looping)),
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
        self.create_and_add_to_scene(
            scene_name,
            source_name,
            kind_for("color"),
            Some(color_settings(color, width, height)),
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
        self.create_and_add_to_scene(
            scene_name,
            source_name,
            kind_for("browser"),
            Some(browser_settings(url, width, height)),
            position,
            scale,
        )
    }

    // --- content setters ---

    pub fn set_text_content(&self, source_name: &str, text: &str) -> Result<(), ObsError> {
        let mut settings = self.get_settings(source_name)?;
        settings["text"] = json!(text);
        self.set_settings(source_name, settings)
    }

    pub fn set_image_path(&self, source_name: &str, file_path: &str) -> Result<(), ObsError> {
        let mut settings = self.get_settings(source_name)?;
        settings["file"] = json!(file_path);
        self.set_settings(source_name, settings)
    }

    pub fn set_video_path(&self, source_name: &str, file_path: &str) -> Result<(), ObsError> {
        let mut settings = self.get_settings(source_name)?;
        settings["local_file"] = json!(file_path);
        self.set_settings(source_name, settings)
    }

    /// Creates the source, then attaches it to the scene.
    pub fn create_and_add_to_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        source_kind: &str,
        settings: Option<Value>,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        self.create_source(source_name, source_kind, settings)?;
        self.add_source_to_scene(scene_name, source_name, position, scale)
    }

    /// Attaches an existing source to a scene, optionally placing it.
    pub fn add_source_to_scene(
        &self,
        scene_name: &str,
        source_name: &str,
        position: Option<(f64, f64)>,
        scale: Option<(f64, f64)>,
    ) -> Result<(), ObsError> {
        require_non_empty(scene_name, "scene name")?;
        require_non_empty(source_name, "source name")?;
        self.ensure_exists(source_name)?;

        let data = response_data(&self.client.call(
            "CreateSceneItem",
            Some(json!({ "sceneName": scene_name, "sourceName": source_name })),
        )?);
        let item_id = super::data_i64(&data, "sceneItemId");

        if position.is_some() || scale.is_some() {
            let item_id = match item_id {
                Some(id) => Some(id),
                None => self.find_item_id(scene_name, source_name)?,
            };
            let Some(item_id) = item_id else {
                warn!("created scene item for '{source_name}' but could not resolve its id");
                return Ok(());
            };

            let mut transform = json!({});
            if let Some((x, y)) = position {
                transform["positionX"] = json!(x);
                transform["positionY"] = json!(y);
            }
            if let Some((x, y)) = scale {
                transform["scaleX"] = json!(x);
                transform["scaleY"] = json!(y);
            }
            self.client.call(
                "SetSceneItemTransform",
                Some(json!({
                    "sceneName": scene_name,
                    "sceneItemId": item_id,
                    "sceneItemTransform": transform,
                })),
            )?;
        }

        info!("added source '{source_name}' to scene '{scene_name}'");
        Ok(())
    }

    pub fn get_info(&self) -> Result<SourcesInfo, ObsError> {
        let all_sources = self.get_all()?;
        let mut source_types = std::collections::HashMap::new();
        for source in &all_sources {
            let kind = if source.input_kind.is_empty() {
                "unknown".to_string()
            } else {
                source.input_kind.clone()
            };
            *source_types.entry(kind).or_insert(0usize) += 1;
        }
        Ok(SourcesInfo {
            total_sources: all_sources.len(),
            source_names: all_sources.into_iter().map(|s| s.input_name).collect(),
            source_types,
            available_types: SOURCE_KINDS.iter().map(|(alias, _)| *alias).collect(),
        })
    }

    /// Fallback for servers whose CreateSceneItem response lacks the
    /// item id: find it in the scene listing.
    fn find_item_id(&self, scene_name: &str, source_name: &str) -> Result<Option<i64>, ObsError> {
        let data = response_data(&self.client.call(
            "GetSceneItemList",
            Some(json!({ "sceneName": scene_name })),
        )?);
        let items: Vec<crate::types::responses::SceneItemEntry> = data
            .get("sceneItems")
            .and_then(|items| serde_json::from_value(items.clone()).ok())
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .find(|item| item.source_name == source_name)
            .map(|item| item.scene_item_id))
    }

    fn ensure_exists(&self, source_name: &str) -> Result<Vec<String>, ObsError> {
        let names = self.get_names()?;
        if !names.iter().any(|name| name == source_name) {
            return Err(ObsError::ResourceNotFound {
                kind: "source",
                name: source_name.to_string(),
                available: names,
            });
        }
        Ok(names)
    }
}

fn text_settings(text: &str, font_size: u32, color: u32) -> Value {
    json!({
        "text": text,
        "font": { "face": "Arial", "size": font_size, "style": "" },
        "color": color,
        "opacity": 100,
        "outline": false,
        "drop_shadow": false,
    })
}

fn image_settings(file_path: &str) -> Value {
    json!({ "file": file_path, "unload": false })
}

fn video_settings(file_path: &str, looping: bool) -> Value {
    json!({
        "local_file": file_path,
        "looping": looping,
        "restart_on_activate": true,
    })
}

fn color_settings(color: u32, width: u32, height: u32) -> Value {
    json!({ "color": color, "width": width, "height": height })
}

fn browser_settings(url: &str, width: u32, height: u32) -> Value {
    json!({
        "url": url,
        "width": width,
        "height": height,
        "fps": 30,
        "shutdown": false,
        "restart_when_active": false,
    })
}
