//! Device descriptor — the descriptive properties of a multi-channel actuator.
//!
//! These fields are supplied once at construction, validated for shape and
//! stored verbatim. Control logic never interprets them.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Descriptive properties of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Unique, human-readable device name (e.g. `"heater"`).
    pub name: String,
    /// Device type (e.g. `"relay"`, `"dimmer"`).
    pub kind: String,
    /// Number of independently controllable channels.
    pub channels: usize,
    /// Per-channel signal names; empty, or one per channel.
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl DeviceInfo {
    /// Create a builder for constructing a [`DeviceInfo`].
    #[must_use]
    pub fn builder() -> DeviceInfoBuilder {
        DeviceInfoBuilder::default()
    }

    /// Check shape invariants.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyField`] for an empty name, kind or signal name
    /// - [`ConfigError::NoChannels`] when `channels == 0`
    /// - [`ConfigError::SignalCount`] when signals are given but not one per channel
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyField("name"));
        }
        if self.kind.trim().is_empty() {
            return Err(ConfigError::EmptyField("kind"));
        }
        if self.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        if !self.signals.is_empty() && self.signals.len() != self.channels {
            return Err(ConfigError::SignalCount {
                expected: self.channels,
                actual: self.signals.len(),
            });
        }
        if self.signals.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptyField("signal"));
        }
        Ok(())
    }

    /// Signal name of channel `index`, if signals were declared.
    #[must_use]
    pub fn signal(&self, index: usize) -> Option<&str> {
        self.signals.get(index).map(String::as_str)
    }
}

/// Step-by-step builder for [`DeviceInfo`].
#[derive(Debug, Default)]
pub struct DeviceInfoBuilder {
    name: Option<String>,
    kind: Option<String>,
    channels: Option<usize>,
    signals: Vec<String>,
    manufacturer: Option<String>,
    model: Option<String>,
}

impl DeviceInfoBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    #[must_use]
    pub fn signal(mut self, signal: impl Into<String>) -> Self {
        self.signals.push(signal.into());
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Consume the builder, validate, and return a [`DeviceInfo`].
    ///
    /// `channels` defaults to 1.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the descriptor fails [`DeviceInfo::validate`].
    pub fn build(self) -> Result<DeviceInfo, ConfigError> {
        let info = DeviceInfo {
            name: self.name.unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            channels: self.channels.unwrap_or(1),
            signals: self.signals,
            manufacturer: self.manufacturer,
            model: self.model,
        };
        info.validate()?;
        Ok(info)
    }
}
