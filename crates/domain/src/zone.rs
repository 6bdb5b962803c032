//! Zone classification — red/yellow/green alarm bands around a value.
//!
//! Five zones, ordered from the lowest to the highest value range:
//!
//! ```text
//!   RedLow | YellowLow |     Green     | YellowHigh | RedHigh
//! -------redLow------yellowLow-----yellowHigh------redHigh------->
//! ```
//!
//! The yellow band always lies strictly inside the red band. A callback fires
//! only when the classified zone *changes* (edge semantics); it receives the
//! zone that was left.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One of the five classification bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    RedLow,
    YellowLow,
    #[default]
    Green,
    YellowHigh,
    RedHigh,
}

impl Zone {
    /// Whether the zone is one of the two red bands.
    #[must_use]
    pub fn is_red(self) -> bool {
        matches!(self, Self::RedLow | Self::RedHigh)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RedLow => f.write_str("red_low"),
            Self::YellowLow => f.write_str("yellow_low"),
            Self::Green => f.write_str("green"),
            Self::YellowHigh => f.write_str("yellow_high"),
            Self::RedHigh => f.write_str("red_high"),
        }
    }
}

/// Callback invoked on entering a zone, with the zone that was left.
pub type ZoneCallback = Arc<dyn Fn(Zone) + Send + Sync>;

/// Lower/upper boundary pair of a band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRange {
    pub low: f64,
    pub high: f64,
}

impl ZoneRange {
    fn validate(self, band: &'static str) -> Result<(), ConfigError> {
        // `!(low < high)` also rejects NaN on either side.
        if self.low.is_nan() || self.high.is_nan() || self.low >= self.high {
            return Err(ConfigError::InvalidZoneRange {
                band,
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    fn strictly_contains(self, inner: Self) -> bool {
        inner.low > self.low && inner.high < self.high
    }
}

/// A red or yellow band: its boundaries plus one callback per side.
#[derive(Clone)]
pub struct ZoneBand {
    pub range: ZoneRange,
    on_low: ZoneCallback,
    on_high: ZoneCallback,
}

impl ZoneBand {
    /// `on_low` fires when the value crosses below `low`, `on_high` when it
    /// crosses above `high`.
    pub fn new(
        low: f64,
        high: f64,
        on_low: impl Fn(Zone) + Send + Sync + 'static,
        on_high: impl Fn(Zone) + Send + Sync + 'static,
    ) -> Self {
        Self {
            range: ZoneRange { low, high },
            on_low: Arc::new(on_low),
            on_high: Arc::new(on_high),
        }
    }

    /// Build a band that routes both sides through one shared callback.
    #[must_use]
    pub fn with_callback(range: ZoneRange, callback: ZoneCallback) -> Self {
        Self {
            range,
            on_low: Arc::clone(&callback),
            on_high: callback,
        }
    }
}

impl fmt::Debug for ZoneBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneBand")
            .field("low", &self.range.low)
            .field("high", &self.range.high)
            .finish_non_exhaustive()
    }
}

/// Partial zone configuration; absent parts keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ZoneSettings {
    pub red: Option<ZoneBand>,
    pub yellow: Option<ZoneBand>,
    pub green: Option<GreenZone>,
}

/// Callback for re-entering the green band.
#[derive(Clone)]
pub struct GreenZone {
    on_enter: ZoneCallback,
}

impl GreenZone {
    pub fn new(on_enter: impl Fn(Zone) + Send + Sync + 'static) -> Self {
        Self {
            on_enter: Arc::new(on_enter),
        }
    }

    #[must_use]
    pub fn with_callback(on_enter: ZoneCallback) -> Self {
        Self { on_enter }
    }
}

impl fmt::Debug for GreenZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GreenZone").finish_non_exhaustive()
    }
}

/// Snapshot of the configured boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneThresholds {
    pub red: Option<ZoneRange>,
    pub yellow: Option<ZoneRange>,
}

/// A zone change produced by [`ZoneClassifier::update`].
#[derive(Clone)]
pub struct ZoneTransition {
    pub from: Zone,
    pub to: Zone,
    callback: Option<ZoneCallback>,
}

impl ZoneTransition {
    /// Invoke the callback registered for the new zone, passing the old one.
    pub fn notify(&self) {
        if let Some(callback) = &self.callback {
            callback(self.from);
        }
    }
}

impl fmt::Debug for ZoneTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneTransition")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

/// Edge-triggered classifier over the configured bands.
#[derive(Debug, Default)]
pub struct ZoneClassifier {
    red: Option<ZoneBand>,
    yellow: Option<ZoneBand>,
    green: Option<GreenZone>,
    current: Zone,
}

impl ZoneClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zone the last classified value fell into.
    #[must_use]
    pub fn current(&self) -> Zone {
        self.current
    }

    #[must_use]
    pub fn thresholds(&self) -> ZoneThresholds {
        ZoneThresholds {
            red: self.red.as_ref().map(|band| band.range),
            yellow: self.yellow.as_ref().map(|band| band.range),
        }
    }

    /// Merge `settings` into the stored configuration.
    ///
    /// The yellow band must end up strictly inside the red band, whichever of
    /// the two is supplied now and whichever is already stored. Once any band
    /// exists the green callback is mandatory, since leaving a band re-enters
    /// green.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidZoneRange`] when a supplied band has `low >= high`
    /// - [`ConfigError::ZoneNesting`] when yellow is not strictly inside red
    /// - [`ConfigError::MissingCallback`] when green would have no callback
    ///
    /// On error nothing is changed.
    pub fn set_zones(&mut self, settings: ZoneSettings) -> Result<(), ConfigError> {
        if let Some(red) = &settings.red {
            red.range.validate("red")?;
        }
        if let Some(yellow) = &settings.yellow {
            yellow.range.validate("yellow")?;
        }

        let red = settings.red.as_ref().or(self.red.as_ref());
        let yellow = settings.yellow.as_ref().or(self.yellow.as_ref());

        if let (Some(red), Some(yellow)) = (red, yellow)
            && !red.range.strictly_contains(yellow.range)
        {
            return Err(ConfigError::ZoneNesting {
                red_low: red.range.low,
                red_high: red.range.high,
                yellow_low: yellow.range.low,
                yellow_high: yellow.range.high,
            });
        }

        let has_band = red.is_some() || yellow.is_some();
        if has_band && settings.green.is_none() && self.green.is_none() {
            return Err(ConfigError::MissingCallback(Zone::Green));
        }

        if let Some(red) = settings.red {
            self.red = Some(red);
        }
        if let Some(yellow) = settings.yellow {
            self.yellow = Some(yellow);
        }
        if let Some(green) = settings.green {
            self.green = Some(green);
        }
        Ok(())
    }

    /// Zone `value` falls into, without touching the stored state.
    ///
    /// The most extreme band wins: red before yellow, low side before high.
    #[must_use]
    pub fn classify(&self, value: f64) -> Zone {
        let red = self.red.as_ref().map(|band| band.range);
        let yellow = self.yellow.as_ref().map(|band| band.range);

        if red.is_some_and(|r| value < r.low) {
            Zone::RedLow
        } else if red.is_some_and(|r| value > r.high) {
            Zone::RedHigh
        } else if yellow.is_some_and(|y| value < y.low) {
            Zone::YellowLow
        } else if yellow.is_some_and(|y| value > y.high) {
            Zone::YellowHigh
        } else {
            Zone::Green
        }
    }

    /// Classify `value` and record the new zone, returning the transition if
    /// the zone changed. The callback is *not* invoked; see
    /// [`ZoneTransition::notify`].
    pub fn update(&mut self, value: f64) -> Option<ZoneTransition> {
        let zone = self.classify(value);
        if zone == self.current {
            return None;
        }
        let from = std::mem::replace(&mut self.current, zone);
        Some(ZoneTransition {
            from,
            to: zone,
            callback: self.callback_for(zone),
        })
    }

    /// Classify `value`, and on a zone change invoke the new zone's callback
    /// with the previous zone. Returns the current zone.
    pub fn check_zone(&mut self, value: f64) -> Zone {
        if let Some(transition) = self.update(value) {
            transition.notify();
        }
        self.current
    }

    fn callback_for(&self, zone: Zone) -> Option<ZoneCallback> {
        match zone {
            Zone::RedLow => self.red.as_ref().map(|band| Arc::clone(&band.on_low)),
            Zone::RedHigh => self.red.as_ref().map(|band| Arc::clone(&band.on_high)),
            Zone::YellowLow => self.yellow.as_ref().map(|band| Arc::clone(&band.on_low)),
            Zone::YellowHigh => self.yellow.as_ref().map(|band| Arc::clone(&band.on_high)),
            Zone::Green => self.green.as_ref().map(|green| Arc::clone(&green.on_enter)),
        }
    }
}
