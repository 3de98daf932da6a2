use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
    #[error("{field} must be a finite number greater than zero, got {value}")]
    InvalidThreshold { field: &'static str, value: f64 },
    #[error("invalid TOML: {0}")]
    Toml(String),
}

/// Thresholds and required counts for one liveness session.
///
/// Immutable for the lifetime of a session. Every field has a default, so a
/// partial TOML table only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LivenessConfig {
    /// Neutral-expression frames collected before any action check.
    pub calibration_frames: usize,
    /// Minimum frame-to-frame nose displacement in pixels.
    pub head_movement_threshold: f64,
    pub head_frames_required: u32,
    /// Mouth ratio must exceed `baseline * mouth_threshold`.
    pub mouth_threshold: f64,
    pub mouth_frames_required: u32,
    /// Eye ratio must drop below `baseline * blink_threshold`.
    pub blink_threshold: f64,
    pub blink_count_required: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            calibration_frames: 30,
            head_movement_threshold: 20.0,
            head_frames_required: 5,
            mouth_threshold: 2.5,
            mouth_frames_required: 3,
            blink_threshold: 0.6,
            blink_count_required: 1,
        }
    }
}

/// Config file layout: settings live under a `[liveness]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    liveness: LivenessConfig,
}

impl LivenessConfig {
    /// Read the `[liveness]` table of a TOML document. A document without
    /// one yields the defaults. The result is not validated.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| ConfigError::Toml(e.to_string()))?;
        Ok(file.liveness)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calibration_frames == 0 {
            return Err(ConfigError::ZeroCount { field: "calibration_frames" });
        }
        for (field, count) in [
            ("head_frames_required", self.head_frames_required),
            ("mouth_frames_required", self.mouth_frames_required),
            ("blink_count_required", self.blink_count_required),
        ] {
            if count == 0 {
                return Err(ConfigError::ZeroCount { field });
            }
        }
        for (field, value) in [
            ("head_movement_threshold", self.head_movement_threshold),
            ("mouth_threshold", self.mouth_threshold),
            ("blink_threshold", self.blink_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidThreshold { field, value });
            }
        }
        Ok(())
    }
}
