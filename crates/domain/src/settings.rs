//! Declarative per-channel settings, as loaded from configuration files.
//!
//! Callbacks cannot be expressed in a file, so zone boundaries are carried as
//! plain ranges and turned into a [`ZoneSettings`] by attaching a single
//! callback that receives every transition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conditioning::{Limits, SignalConditioner, Transform};
use crate::error::ConfigError;
use crate::zone::{GreenZone, ZoneBand, ZoneCallback, ZoneClassifier, ZoneRange, ZoneSettings};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub transform: Option<Transform>,
    pub limits: Option<Limits>,
    pub red: Option<ZoneRange>,
    pub yellow: Option<ZoneRange>,
}

impl ChannelSettings {
    /// Whether any zone band is declared.
    #[must_use]
    pub fn has_zones(&self) -> bool {
        self.red.is_some() || self.yellow.is_some()
    }

    /// Check the settings against a fresh conditioner and classifier.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] that applying them would produce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut conditioner = SignalConditioner::new();
        if let Some(transform) = self.transform {
            conditioner.set_transform(transform.k, transform.b)?;
        }
        if let Some(limits) = self.limits {
            conditioner.set_limits(limits.low, limits.high)?;
        }
        if self.has_zones() {
            let noop: ZoneCallback = Arc::new(|_| {});
            ZoneClassifier::new().set_zones(self.zone_settings(&noop))?;
        }
        Ok(())
    }

    /// Build zone settings routing every zone to `callback`.
    ///
    /// The callback receives the *previous* zone; the caller is expected to
    /// read the new one from the classifier or the published event.
    #[must_use]
    pub fn zone_settings(&self, callback: &ZoneCallback) -> ZoneSettings {
        ZoneSettings {
            red: self
                .red
                .map(|range| ZoneBand::with_callback(range, callback.clone())),
            yellow: self
                .yellow
                .map(|range| ZoneBand::with_callback(range, callback.clone())),
            green: self
                .has_zones()
                .then(|| GreenZone::with_callback(callback.clone())),
        }
    }
}
