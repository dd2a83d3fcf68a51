//! Device configuration document.
//!
//! The simulator is driven by a single YAML file listing the broker and the
//! devices to impersonate. The document is read once at startup and never
//! changes afterwards; everything downstream works from borrowed views of it.
//!
//! ```yaml
//! broker: localhost
//! devices:
//!   - nickname: Sensor1
//!     mqtt_base_topic: home/sensor1
//!     channels:
//!       - type: integer
//!         status_suffix: temp
//!       - type: boolean
//!         status_suffix: state
//!         mqtt_payload_format: "('dict', 'POWER')"
//! ```
//!
//! Keys the simulator has no use for (command suffixes and the like) are
//! ignored, so the same file can describe the real devices.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::simulation::payload::{PayloadFormat, PayloadStyle};

pub const DEFAULT_BROKER: &str = "localhost";
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 500;
pub const CONFIG_FILE_NAME: &str = "devices_configuration.yaml";
const APP_DIR: &str = "mqtt-device-sim";
const LEGACY_CONFIG_DIR: &str = "example";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("device '{device}' publishes '{suffix}' with an unsupported channel type")]
    UnsupportedType { device: String, suffix: String },
}

/// Declared value type of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Float,
    Integer,
    Boolean,
    /// Any other type name. Only valid on channels that are never published.
    #[default]
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelConfig {
    #[serde(rename = "type", default)]
    pub kind: ChannelType,
    #[serde(default)]
    pub status_suffix: Option<String>,
    #[serde(rename = "mqtt_payload_format", default)]
    pub payload_format: Option<PayloadFormat>,
}

impl ChannelConfig {
    /// Only channels that declare a status suffix are published.
    pub fn is_published(&self) -> bool {
        self.status_suffix.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceConfig {
    pub nickname: String,
    #[serde(default)]
    pub mqtt_base_topic: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl DeviceConfig {
    /// Base topic, or `None` when the device has no usable one.
    pub fn base_topic(&self) -> Option<&str> {
        self.mqtt_base_topic
            .as_deref()
            .filter(|topic| !topic.is_empty())
    }

    /// Topic a channel publishes on, `None` if it does not publish at all.
    pub fn topic_for(&self, channel: &ChannelConfig) -> Option<String> {
        let base = self.base_topic()?;
        let suffix = channel.status_suffix.as_deref()?;
        Some(format!("{}/{}", base, suffix))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_broker")]
    pub broker: String,
    #[serde(default)]
    pub publish_interval_ms: Option<u64>,
    #[serde(default)]
    pub payload_style: Option<PayloadStyle>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_broker() -> String {
    DEFAULT_BROKER.to_string()
}

impl SimulatorConfig {
    /// Reads, parses and validates the document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SimulatorConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for device in &self.devices {
            if device.base_topic().is_none() {
                warn!(
                    "Device '{}' has no mqtt_base_topic and will not publish",
                    device.nickname
                );
                continue;
            }
            for channel in device.channels.iter().filter(|c| c.is_published()) {
                if channel.kind == ChannelType::Unsupported {
                    return Err(ConfigError::UnsupportedType {
                        device: device.nickname.clone(),
                        suffix: channel.status_suffix.clone().unwrap_or_default(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn publish_interval_ms(&self) -> u64 {
        self.publish_interval_ms
            .unwrap_or(DEFAULT_PUBLISH_INTERVAL_MS)
    }
}

/// Places the simulator looks for its device file, in order.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(CONFIG_FILE_NAME),
        Path::new(LEGACY_CONFIG_DIR).join(CONFIG_FILE_NAME),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(APP_DIR).join(CONFIG_FILE_NAME));
    }
    candidates
}

/// An explicit path always wins, even when it does not exist; otherwise the
/// first existing candidate, falling back to the first candidate so the
/// not-found diagnostic names a sensible file.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    let candidates = candidate_paths();
    candidates
        .iter()
        .find(|path| path.is_file())
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}
