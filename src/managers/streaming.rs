//! Streaming control: status queries and the start/stop/toggle
//! lifecycle. The state is always read fresh from the application;
//! nothing is cached locally.

use std::sync::Arc;

use log::info;
use serde_json::json;

use crate::client::ObsClient;
use crate::errors::ObsError;
use crate::protocol::response_data;
use crate::types::responses::{StreamStatus, StreamingInfo};

pub struct StreamingManager {
    client: Arc<ObsClient>,
}

impl StreamingManager {
    pub fn new(client: Arc<ObsClient>) -> Self {
        Self { client }
    }

    pub fn get_status(&self) -> Result<StreamStatus, ObsError> {
        let data = response_data(&self.client.call("GetStreamStatus", None)?);
        Ok(serde_json::from_value(data).unwrap_or_default())
    }

    pub fn is_streaming(&self) -> Result<bool, ObsError> {
        Ok(self.get_status()?.active)
    }

    pub fn is_reconnecting(&self) -> Result<bool, ObsError> {
        Ok(self.get_status()?.reconnecting)
    }

    /// Milliseconds streamed so far.
    pub fn get_duration(&self) -> Result<i64, ObsError> {
        Ok(self.get_status()?.duration)
    }

    pub fn get_timecode(&self) -> Result<String, ObsError> {
        Ok(self
            .get_status()?
            .timecode
            .unwrap_or_else(|| "00:00:00".to_string()))
    }

    pub fn get_bytes_sent(&self) -> Result<u64, ObsError> {
        Ok(self.get_status()?.bytes)
    }

    pub fn get_dropped_frames(&self) -> Result<i64, ObsError> {
        Ok(self.get_status()?.skipped_frames)
    }

    pub fn get_total_frames(&self) -> Result<i64, ObsError> {
        Ok(self.get_status()?.total_frames)
    }

    /// Network congestion, 0.0..=1.0.
    pub fn get_congestion(&self) -> Result<f64, ObsError> {
        Ok(self.get_status()?.congestion)
    }

    pub fn start(&self) -> Result<(), ObsError> {
        if self.is_streaming()? {
            return Err(ObsError::OutputRunning("stream"));
        }
        self.client.call("StartStream", None)?;
        info!("stream started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), ObsError> {
        if !self.is_streaming()? {
            return Err(ObsError::OutputNotRunning("stream"));
        }
        self.client.call("StopStream", None)?;
        info!("stream stopped");
        Ok(())
    }

    /// Toggles and returns the new state; the negation happens
    /// server-side so two callers cannot both act on a stale reading.
    pub fn toggle(&self) -> Result<bool, ObsError> {
        let data = response_data(&self.client.call("ToggleStream", None)?);
        let active = super::data_bool(&data, "outputActive");
        info!("stream {}", if active { "started" } else { "stopped" });
        Ok(active)
    }

    pub fn get_info(&self) -> Result<StreamingInfo, ObsError> {
        let status = self.get_status()?;
        let drop_rate = if status.total_frames > 0 {
            status.skipped_frames as f64 / status.total_frames as f64 * 100.0
        } else {
            0.0
        };
        Ok(StreamingInfo {
            streaming: status.active,
            reconnecting: status.reconnecting,
            duration: status.duration,
            timecode: status.timecode.unwrap_or_else(|| "00:00:00".to_string()),
            bytes_sent: status.bytes,
            dropped_frames: status.skipped_frames,
            total_frames: status.total_frames,
            congestion: status.congestion,
            drop_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, FakeReply, FakeState};
    use serde_json::json;

    fn stream_status(active: bool) -> FakeReply {
        FakeReply::Respond(json!({
            "outputActive": active,
            "outputReconnecting": false,
            "outputTimecode": "00:05:00.000",
            "outputDuration": 300_000,
            "outputBytes": 52_428_800u64,
            "outputSkippedFrames": 30,
            "outputTotalFrames": 18_000,
            "outputCongestion": 0.1,
        }))
    }

    fn manager(script: Vec<FakeReply>) -> (StreamingManager, Arc<FakeState>) {
        let (client, state) = testkit::client(script);
        client.connect().unwrap();
        (StreamingManager::new(Arc::new(client)), state)
    }

    #[test]
    fn start_refuses_while_already_streaming() {
        let (streaming, state) = manager(vec![stream_status(true)]);
        assert!(matches!(
            streaming.start(),
            Err(ObsError::OutputRunning("stream"))
        ));
        assert!(state.requests().iter().all(|(t, _, _)| t != "StartStream"));
    }

    #[test]
    fn stop_refuses_while_not_streaming() {
        let (streaming, _state) = manager(vec![stream_status(false)]);
        assert!(matches!(
            streaming.stop(),
            Err(ObsError::OutputNotRunning("stream"))
        ));
    }

    #[test]
    fn toggle_is_a_single_round_trip() {
        let (streaming, state) = manager(vec![FakeReply::Respond(json!({
            "outputActive": true
        }))]);
        assert!(streaming.toggle().unwrap());
        let sent = state.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ToggleStream");
    }

    #[test]
    fn info_derives_the_drop_rate() {
        let (streaming, _state) = manager(vec![stream_status(true)]);
        let info = streaming.get_info().unwrap();
        assert!(info.streaming);
        assert_eq!(info.dropped_frames, 30);
        assert!((info.drop_rate - 30.0 / 18_000.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn info_handles_a_stream_that_never_ran() {
        let (streaming, _state) = manager(vec![FakeReply::Respond(json!({}))]);
        let info = streaming.get_info().unwrap();
        assert!(!info.streaming);
        assert_eq!(info.timecode, "00:00:00");
        assert_eq!(info.drop_rate, 0.0);
    }
}
