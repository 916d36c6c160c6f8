//! Settings schema. JSON keys are camelCase; every field has a compiled default.

use serde::{Deserialize, Serialize};
use streamhost_core::{ConnectionConfig, EncoderPreference, SignalingParams};

use crate::errors::{Result, SettingsError};

/// Root settings object for the session host.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamingSettings {
    pub signaling: SignalingParams,
    pub connection: ConnectionConfig,
    /// Prefer the hardware encoder when the engine supports it.
    pub hardware_encoder: bool,
    /// Start a session as soon as the host reports ready.
    pub auto_start: bool,
    /// Capacity of the engine → hub event queue.
    pub event_queue_capacity: usize,
    pub logging: LoggingSettings,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            signaling: SignalingParams::default(),
            connection: ConnectionConfig::default(),
            hardware_encoder: true,
            auto_start: true,
            event_queue_capacity: 256,
            logging: LoggingSettings::default(),
        }
    }
}

impl StreamingSettings {
    pub fn encoder(&self) -> EncoderPreference {
        EncoderPreference::from_hardware_flag(self.hardware_encoder)
    }

    /// Reject values no session could start with.
    pub fn validate(&self) -> Result<()> {
        self.signaling
            .validate()
            .map_err(|e| SettingsError::InvalidValue(e.to_string()))?;
        if self.event_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "eventQueueCapacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Log output settings, consumed by the binary when it installs telemetry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
