//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hwctl.toml` in the working directory, or at the path named by
//! `HWCTL_CONFIG`. Every field has a default so the file is optional; without
//! one the daemon runs a small demo rig. Environment variables take
//! precedence over file values.

use std::collections::HashSet;

use serde::Deserialize;

use hwctl_adapter_virtual::DriverKind;
use hwctl_domain::conditioning::{Limits, Transform};
use hwctl_domain::device::DeviceInfo;
use hwctl_domain::settings::ChannelSettings;
use hwctl_domain::zone::ZoneRange;

/// Default config file name.
pub const DEFAULT_PATH: &str = "hwctl.toml";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Event bus settings.
    pub events: EventsConfig,
    /// Simulated devices to build.
    pub devices: Vec<DeviceConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Event bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity.
    pub capacity: usize,
}

/// One simulated device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// Which simulated driver backs the device.
    pub driver: DriverKind,
    /// Per-channel settings; channels not listed keep their defaults.
    #[serde(default, rename = "channel")]
    pub channel_settings: Vec<ChannelConfig>,
}

/// Settings for one channel of a device.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub index: usize,
    #[serde(flatten)]
    pub settings: ChannelSettings,
    /// Default duration of the `pulse` task.
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,
    /// Control value the `pulse` task drives the channel with.
    #[serde(default = "default_pulse_level")]
    pub pulse_level: f64,
}

impl DeviceConfig {
    /// Settings for channel `index`, if configured.
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&ChannelConfig> {
        self.channel_settings.iter().find(|c| c.index == index)
    }
}

impl Config {
    /// Load configuration from `HWCTL_CONFIG` or `hwctl.toml` (if present),
    /// then apply environment-variable overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the result
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HWCTL_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HWCTL_EVENT_CAPACITY")
            && let Ok(capacity) = val.parse()
        {
            self.events.capacity = capacity;
        }
        if let Ok(val) = std::env::var("HWCTL_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// Check everything the devices will be built from.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events.capacity == 0 {
            return Err(ConfigError::Validation(
                "event capacity must be non-zero".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            let name = device.info.name.clone();
            device
                .info
                .validate()
                .map_err(|source| ConfigError::Device {
                    device: name.clone(),
                    source,
                })?;
            if !names.insert(name.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate device name {name}"
                )));
            }

            let mut seen = HashSet::new();
            for channel in &device.channel_settings {
                if channel.index >= device.info.channels {
                    return Err(ConfigError::Validation(format!(
                        "device {name} has no channel {}",
                        channel.index
                    )));
                }
                if !seen.insert(channel.index) {
                    return Err(ConfigError::Validation(format!(
                        "device {name} configures channel {} twice",
                        channel.index
                    )));
                }
                channel
                    .settings
                    .validate()
                    .map_err(|source| ConfigError::Device {
                        device: format!("{name}:{}", channel.index),
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            events: EventsConfig::default(),
            devices: demo_devices(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hwctld=info,hwctl_app=info,hwctl_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

fn default_pulse_ms() -> u64 {
    500
}

fn default_pulse_level() -> f64 {
    1.0
}

/// A two-channel heater dimmer with alarm zones and a two-channel pump relay.
fn demo_devices() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig {
            info: DeviceInfo {
                name: "heater".to_string(),
                kind: "heater".to_string(),
                channels: 2,
                signals: vec!["zone_a".to_string(), "zone_b".to_string()],
                manufacturer: Some("hwctl".to_string()),
                model: Some("VDIM-2".to_string()),
            },
            driver: DriverKind::Dimmer,
            channel_settings: vec![ChannelConfig {
                index: 0,
                settings: ChannelSettings {
                    transform: Some(Transform { k: 10.0, b: 0.0 }),
                    limits: Some(Limits {
                        low: 0.0,
                        high: 100.0,
                    }),
                    red: Some(ZoneRange {
                        low: 5.0,
                        high: 95.0,
                    }),
                    yellow: Some(ZoneRange {
                        low: 15.0,
                        high: 85.0,
                    }),
                },
                pulse_ms: default_pulse_ms(),
                pulse_level: 5.0,
            }],
        },
        DeviceConfig {
            info: DeviceInfo {
                name: "pumps".to_string(),
                kind: "relay".to_string(),
                channels: 2,
                signals: Vec::new(),
                manufacturer: Some("hwctl".to_string()),
                model: Some("VREL-2".to_string()),
            },
            driver: DriverKind::Relay,
            channel_settings: Vec::new(),
        },
    ]
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A device or channel section was rejected.
    #[error("invalid settings for {device}")]
    Device {
        device: String,
        #[source]
        source: hwctl_domain::error::ConfigError,
    },
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
