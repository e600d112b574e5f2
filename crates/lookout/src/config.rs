//! Service configuration
//!
//! Layered from an optional TOML file and `LOOKOUT__SECTION__KEY`
//! environment variables, e.g. `LOOKOUT__POLICY__CONFIDENCE_THRESHOLD=0.7`.

use camera_capture::CaptureConfig;
use config::{Config, ConfigError, Environment, File};
use decision_policy::Policy;
use deterrent::DeterrentConfig;
use inference_engine::{EngineConfig, ModelConfig};
use monitor::MonitorConfig;
use sensor_monitor::SensorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::hardware::HardwareConfig;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "lookout.toml";

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// External still-capture program writing an image to stdout
    #[default]
    Command,
    /// Replay image files from a directory
    Directory,
    /// Solid test frames
    Simulated,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Maximum time to wait for a frame (ms)
    pub timeout_ms: u64,
    pub source: SourceKind,
    /// Capture program for the `command` source
    pub program: String,
    pub args: Vec<String>,
    /// Image directory for the `directory` source
    pub directory: PathBuf,
    /// Frame size of the `simulated` source
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            source: SourceKind::Command,
            program: "libcamera-still".to_string(),
            args: ["-n", "-t", "1", "-e", "jpg", "--width", "1280", "--height", "720", "-o", "-"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            directory: PathBuf::from("frames"),
            width: 1280,
            height: 720,
        }
    }
}

impl CameraConfig {
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookoutConfig {
    pub policy: Policy,
    pub sensor: SensorConfig,
    pub camera: CameraConfig,
    pub inference: EngineConfig,
    /// Detection model; without one the service runs a mock detector
    pub model: Option<ModelConfig>,
    pub deterrent: DeterrentConfig,
    pub monitor: MonitorConfig,
    pub hardware: HardwareConfig,
    pub logging: LoggingConfig,
}

impl LookoutConfig {
    /// Load from `path` (required) or the default file (optional), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        debug!("Loading configuration from {}", path.display());

        let settings = Config::builder()
            .add_source(File::from(path.as_path()).required(required))
            .add_source(
                Environment::with_prefix("LOOKOUT")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("policy.deter_species")
                    .with_list_parse_key("policy.ignore_species")
                    .with_list_parse_key("inference.valid_labels")
                    .with_list_parse_key("camera.args")
                    .with_list_parse_key("hardware.ir_led_pins"),
            )
            .build()?;

        let config: LookoutConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy
            .validate()
            .map_err(|e| ConfigError::Message(format!("policy: {}", e)))?;

        if self.camera.timeout_ms == 0 || self.inference.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "camera and inference timeouts must be greater than zero".to_string(),
            ));
        }
        if self.camera.source == SourceKind::Command && self.camera.program.trim().is_empty() {
            return Err(ConfigError::Message(
                "camera.program is required for the command source".to_string(),
            ));
        }
        if self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "sensor.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.deterrent.enabled && self.deterrent.frequency_hz == 0 {
            return Err(ConfigError::Message(
                "deterrent.frequency_hz must be greater than zero".to_string(),
            ));
        }
        if self.hardware.simulated_motion_period_ms == Some(0) {
            return Err(ConfigError::Message(
                "hardware.simulated_motion_period_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
