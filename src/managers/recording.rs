//! Recording control: status queries, start/stop/pause lifecycle,
//! output directory handling and the quick-record convenience flow.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{info, warn};
use serde_json::json;

use crate::client::ObsClient;
use crate::errors::ObsError;
use crate::protocol::response_data;
use crate::retry::RetryPolicy;
use crate::types::responses::{RecordStatus, RecordingInfo};

use super::data_str;

/// Settle time after StopRecord before touching the output file; the
/// writer may still be flushing it.
const FILE_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Moving a freshly finished recording can hit a file lock held by the
/// still-finalizing writer; two more tries with a delay usually get
/// through.
const MOVE_RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_secs(1));

pub struct RecordingManager {
    client: Arc<ObsClient>,
    /// Target directory remembered even when the application refused
    /// to take it (graceful degrade of `set_output_directory`).
    default_output_dir: Mutex<Option<PathBuf>>,
}

impl RecordingManager {
    pub fn new(client: Arc<ObsClient>) -> Self {
        Self {
            client,
            default_output_dir: Mutex::new(None),
        }
    }

    pub fn get_status(&self) -> Result<RecordStatus, ObsError> {
        let data = response_data(&self.client.call("GetRecordStatus", None)?);
        Ok(serde_json::from_value(data).unwrap_or_default())
    }

    pub fn is_recording(&self) -> Result<bool, ObsError> {
        Ok(self.get_status()?.active)
    }

    pub fn is_paused(&self) -> Result<bool, ObsError> {
        Ok(self.get_status()?.paused)
    }

    /// Milliseconds recorded so far; `None` while not recording.
    pub fn get_duration(&self) -> Result<Option<i64>, ObsError> {
        Ok(self.get_status()?.duration)
    }

    pub fn get_timecode(&self) -> Result<Option<String>, ObsError> {
        Ok(self.get_status()?.timecode)
    }

    /// Points the application's own file output at `directory`,
    /// creating it first. Tries the advanced output, then the simple
    /// one; when neither takes the setting the directory is only
    /// remembered locally and `Ok(false)` is returned.
    pub fn set_output_directory(&self, directory: &Path) -> Result<bool, ObsError> {
        fs::create_dir_all(directory)?;
        let absolute = std::path::absolute(directory)?;
        let rendered = absolute.to_string_lossy().into_owned();

        for (output_name, path_key) in [
            ("adv_file_output", "path"),
            ("simple_file_output", "FilePath"),
        ] {
            match self.apply_output_path(output_name, path_key, &rendered) {
                Ok(()) => {
                    *self.lock_default_dir() = Some(absolute.clone());
                    info!("recording output directory set to {rendered}");
                    return Ok(true);
                }
                Err(e) => {
                    warn!("could not set {output_name} path: {e}");
                }
            }
        }

        *self.lock_default_dir() = Some(absolute);
        warn!("output directory not applied via the API; remembered {rendered} locally");
        Ok(false)
    }

    fn apply_output_path(
        &self,
        output_name: &str,
        path_key: &str,
        directory: &str,
    ) -> Result<(), ObsError> {
        let response = self.client.call(
            "GetOutputSettings",
            Some(json!({ "outputName": output_name })),
        )?;
        let mut settings = response_data(&response)
            .get("outputSettings")
            .cloned()
            .unwrap_or(json!({}));
        settings[path_key] = json!(directory);
        self.client.call(
            "SetOutputSettings",
            Some(json!({
                "outputName": output_name,
                "outputSettings": settings,
            })),
        )?;
        Ok(())
    }

    /// Directory recordings currently land in: the advanced output's
    /// path, the simple output's, or the locally remembered one.
    pub fn get_output_directory(&self) -> Result<Option<PathBuf>, ObsError> {
        for (output_name, path_key) in [
            ("adv_file_output", "path"),
            ("simple_file_output", "FilePath"),
        ] {
            let response = self.client.call(
                "GetOutputSettings",
                Some(json!({ "outputName": output_name })),
            );
            if let Ok(response) = response {
                let settings = response_data(&response)
                    .get("outputSettings")
                    .cloned()
                    .unwrap_or(json!({}));
                let path = data_str(&settings, path_key);
                if !path.is_empty() {
                    return Ok(Some(PathBuf::from(path)));
                }
            }
        }
        Ok(self.lock_default_dir().clone())
    }

    /// Starts recording. `output_directory` is applied first when
    /// given; otherwise a `download/` directory under the working
    /// directory is used the first time.
    pub fn start(
        &self,
        output_directory: Option<&Path>,
        filename: Option<&str>,
    ) -> Result<(), ObsError> {
        if self.is_recording()? {
            return Err(ObsError::OutputRunning("recording"));
        }

        if let Some(directory) = output_directory {
            self.set_output_directory(directory)?;
        } else if self.lock_default_dir().is_none() {
            let download = std::env::current_dir()?.join("download");
            self.set_output_directory(&download)?;
        }

        if let (Some(filename), Some(directory)) = (filename, output_directory) {
            // Not every server build accepts this request; losing the
            // custom filename is not worth failing the recording.
            let full_path = directory.join(filename);
            if let Err(e) = self.client.call(
                "SetRecordFilename",
                Some(json!({ "filename": full_path.to_string_lossy() })),
            ) {
                warn!("could not set the recording filename: {e}");
            }
        }

        self.client.call("StartRecord", None)?;
        info!("recording started");
        Ok(())
    }

    /// Stops recording and returns the finished file's path.
    pub fn stop(&self) -> Result<PathBuf, ObsError> {
        if !self.is_recording()? {
            return Err(ObsError::OutputNotRunning("recording"));
        }
        let data = response_data(&self.client.call("StopRecord", None)?);
        let output_path = PathBuf::from(data_str(&data, "outputPath"));
        info!("recording stopped, file at {}", output_path.display());
        Ok(output_path)
    }

    /// Toggles and returns the new state. Single round trip; the
    /// negation happens server-side to avoid racing a stale reading.
    pub fn toggle(&self) -> Result<bool, ObsError> {
        let data = response_data(&self.client.call("ToggleRecord", None)?);
        let active = super::data_bool(&data, "outputActive");
        info!(
            "recording {}",
            if active { "started" } else { "stopped" }
        );
        Ok(active)
    }

    pub fn pause(&self) -> Result<(), ObsError> {
        if !self.is_recording()? {
            return Err(ObsError::OutputNotRunning("recording"));
        }
        if self.is_paused()? {
            warn!("recording is already paused");
            return Ok(());
        }
        self.client.call("PauseRecord", None)?;
        info!("recording paused");
        Ok(())
    }

    pub fn resume(&self) -> Result<(), ObsError> {
        if !self.is_recording()? {
            return Err(ObsError::OutputNotRunning("recording"));
        }
        if !self.is_paused()? {
            warn!("recording is not paused");
            return Ok(());
        }
        self.client.call("ResumeRecord", None)?;
        info!("recording resumed");
        Ok(())
    }

    /// Records for `duration`, then makes sure the finished file ends
    /// up in the target directory, moving it there when the
    /// application wrote it somewhere else.
    pub fn quick_record(
        &self,
        duration: Duration,
        output_directory: Option<&Path>,
        filename: Option<&str>,
    ) -> Result<PathBuf, ObsError> {
        let target_dir = match output_directory {
            Some(directory) => directory.to_path_buf(),
            None => std::env::current_dir()?.join("download"),
        };
        self.set_output_directory(&target_dir)?;

        self.start(Some(&target_dir), filename)?;
        info!("quick-recording for {duration:?}");
        thread::sleep(duration);

        let original_path = match self.stop() {
            Ok(path) => path,
            Err(e) => {
                // best effort: never leave a quick-record session running
                if self.is_recording().unwrap_or(false) {
                    let _ = self.stop();
                }
                return Err(e);
            }
        };

        thread::sleep(FILE_SETTLE_DELAY);

        let target_dir = std::path::absolute(&target_dir)?;
        let original_dir = original_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        if original_dir == target_dir {
            return Ok(original_path);
        }

        match MOVE_RETRY.run("moving the finished recording", || {
            move_file_to_directory(&original_path, &target_dir)
        }) {
            Ok(moved) => Ok(moved),
            Err(e) => {
                warn!("could not move the recording ({e}); returning the original path");
                Ok(original_path)
            }
        }
    }

    pub fn get_info(&self) -> Result<RecordingInfo, ObsError> {
        let status = self.get_status()?;
        Ok(RecordingInfo {
            recording: status.active,
            paused: status.paused,
            duration: status.duration,
            timecode: status.timecode,
            bytes: status.bytes,
        })
    }

    fn lock_default_dir(&self) -> std::sync::MutexGuard<'_, Option<PathBuf>> {
        self.default_output_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Moves `source` into `target_directory`, de-duplicating the name
/// with a time suffix when the target already exists.
fn move_file_to_directory(source: &Path, target_directory: &Path) -> Result<PathBuf, ObsError> {
    if !source.exists() {
        return Err(ObsError::InvalidParameter(format!(
            "source file does not exist: {}",
            source.display()
        )));
    }
    fs::create_dir_all(target_directory)?;

    let filename = source
        .file_name()
        .ok_or_else(|| {
            ObsError::InvalidParameter(format!("source has no file name: {}", source.display()))
        })?
        .to_os_string();
    let mut target = target_directory.join(&filename);
    if target.exists() {
        let stamp = chrono::Local::now().format("_%H%M%S");
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut renamed = format!("{stem}{stamp}");
        if let Some(extension) = source.extension() {
            renamed.push('.');
            renamed.push_str(&extension.to_string_lossy());
        }
        target = target_directory.join(renamed);
    }

    // rename fails across filesystems; fall back to copy + remove
    if fs::rename(source, &target).is_err() {
        fs::copy(source, &target)?;
        fs::remove_file(source)?;
    }
    info!("moved {} -> {}", source.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeReply, FakeState};
    use serde_json::json;

    fn record_status(active: bool, paused: bool) -> FakeReply {
        FakeReply::Respond(json!({
            "outputActive": active,
            "outputPaused": paused,
            "outputTimecode": if active { Some("00:00:10.000") } else { None },
            "outputDuration": if active { Some(10_000) } else { None },
            "outputBytes": 2048,
        }))
    }

    fn manager(script: Vec<FakeReply>) -> (RecordingManager, Arc<FakeState>) {
        let (client, state) = testkit::client(script);
        client.connect().unwrap();
        (RecordingManager::new(Arc::new(client)), state)
    }

    #[test]
    fn start_refuses_while_already_recording() {
        let (recording, state) = manager(vec![record_status(true, false)]);
        assert!(matches!(
            recording.start(None, None),
            Err(ObsError::OutputRunning("recording"))
        ));
        assert!(state.requests().iter().all(|(t, _, _)| t != "StartRecord"));
    }

    #[test]
    fn stop_refuses_while_not_recording() {
        let (recording, _state) = manager(vec![record_status(false, false)]);
        assert!(matches!(
            recording.stop(),
            Err(ObsError::OutputNotRunning("recording"))
        ));
    }

    #[test]
    fn stop_returns_the_output_path() {
        let (recording, _state) = manager(vec![
            record_status(true, false),
            FakeReply::Respond(json!({ "outputPath": "/videos/2026-08-06.mkv" })),
        ]);
        assert_eq!(
            recording.stop().unwrap(),
            PathBuf::from("/videos/2026-08-06.mkv")
        );
    }

    #[test]
    fn pause_requires_an_active_unpaused_recording() {
        let (recording, _state) = manager(vec![record_status(false, false)]);
        assert!(matches!(
            recording.pause(),
            Err(ObsError::OutputNotRunning("recording"))
        ));

        // pausing an already paused recording is tolerated
        let (recording, state) = manager(vec![
            record_status(true, true),
            record_status(true, true),
        ]);
        recording.pause().unwrap();
        assert!(state.requests().iter().all(|(t, _, _)| t != "PauseRecord"));
    }

    #[test]
    fn set_output_directory_degrades_to_remembering_locally() {
        let reject = || FakeReply::Reject {
            code: 600,
            comment: "No output was found".to_string(),
        };
        // both the advanced and the simple output refuse the setting
        let (recording, _state) = manager(vec![reject(), reject()]);

        let dir = std::env::temp_dir().join(format!("obs-control-rec-{}", std::process::id()));
        let applied = recording.set_output_directory(&dir).unwrap();
        assert!(!applied);

        // with the settings queries returning nothing useful, the
        // locally remembered directory is what comes back
        let remembered = recording.get_output_directory().unwrap().unwrap();
        assert!(remembered.ends_with(dir.file_name().unwrap()));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn move_file_lands_in_the_target_directory() {
        let base = std::env::temp_dir().join(format!("obs-control-move-{}", std::process::id()));
        let source_dir = base.join("src");
        let target_dir = base.join("dst");
        fs::create_dir_all(&source_dir).unwrap();
        let source = source_dir.join("clip.mkv");
        fs::write(&source, b"data").unwrap();

        let moved = move_file_to_directory(&source, &target_dir).unwrap();
        assert!(moved.starts_with(&target_dir));
        assert!(!source.exists());
        assert_eq!(fs::read(&moved).unwrap(), b"data");

        // a second file with the same name gets a de-duplicated target
        fs::write(&source, b"more").unwrap();
        let moved_again = move_file_to_directory(&source, &target_dir).unwrap();
        assert_ne!(moved, moved_again);
        assert!(moved_again.starts_with(&target_dir));

        fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn moving_a_missing_file_fails_without_touching_the_target() {
        let base = std::env::temp_dir().join(format!("obs-control-move2-{}", std::process::id()));
        let result = move_file_to_directory(&base.join("ghost.mkv"), &base.join("dst"));
        assert!(matches!(result, Err(ObsError::InvalidParameter(_))));
        fs::remove_dir_all(&base).ok();
    }
}
