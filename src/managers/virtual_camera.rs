//! Virtual camera control.

use std::sync::Arc;

use log::info;

use crate::client::ObsClient;
use crate::errors::ObsError;
use crate::protocol::response_data;
use crate::types::responses::{VirtualCamStatus, VirtualCameraInfo};

pub struct VirtualCameraManager {
    client: Arc<ObsClient>,
}

impl VirtualCameraManager {
    pub fn new(client: Arc<ObsClient>) -> Self {
        Self { client }
    }

    pub fn get_status(&self) -> Result<VirtualCamStatus, ObsError> {
        let data = response_data(&self.client.call("GetVirtualCamStatus", None)?);
        Ok(serde_json::from_value(data).unwrap_or_default())
    }

    pub fn is_active(&self) -> Result<bool, ObsError> {
        Ok(self.get_status()?.active)
    }

    pub fn start(&self) -> Result<(), ObsError> {
        if self.is_active()? {
            return Err(ObsError::OutputRunning("virtual camera"));
        }
        self.client.call("StartVirtualCam", None)?;
        info!("virtual camera started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), ObsError> {
        if !self.is_active()? {
            return Err(ObsError::OutputNotRunning("virtual camera"));
        }
        self.client.call("StopVirtualCam", None)?;
        info!("virtual camera stopped");
        Ok(())
    }

    /// Toggles and returns the new state; one round trip, negated
    /// server-side.
    pub fn toggle(&self) -> Result<bool, ObsError> {
        let data = response_data(&self.client.call("ToggleVirtualCam", None)?);
        let active = super::data_bool(&data, "outputActive");
        info!(
            "virtual camera {}",
            if active { "started" } else { "stopped" }
        );
        Ok(active)
    }

    pub fn get_info(&self) -> Result<VirtualCameraInfo, ObsError> {
        Ok(VirtualCameraInfo {
            active: self.is_active()?,
        })
    }
}
