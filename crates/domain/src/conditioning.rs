//! Signal conditioning — linear transform followed by a range clamp.
//!
//! Every control value headed for hardware goes through
//! [`SignalConditioner::condition`]. The clamp bounds are expressed in
//! *transformed* units, so the transform always runs first.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Linear transform coefficients: `v * k + b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub k: f64,
    pub b: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self { k: 1.0, b: 0.0 }
    }
}

/// Clamp bounds. Infinite bounds leave that side open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub low: f64,
    pub high: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
        }
    }
}

/// Transform-then-clamp pipeline for one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalConditioner {
    transform: Transform,
    limits: Limits,
}

impl SignalConditioner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the transform coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonFinite`] unless both `k` and `b` are finite.
    pub fn set_transform(&mut self, k: f64, b: f64) -> Result<(), ConfigError> {
        finite("k", k)?;
        finite("b", b)?;
        self.transform = Transform { k, b };
        Ok(())
    }

    /// Replace the clamp bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonFinite`] if either bound is NaN and
    /// [`ConfigError::InvalidLimits`] unless `low < high`.
    pub fn set_limits(&mut self, low: f64, high: f64) -> Result<(), ConfigError> {
        if low.is_nan() {
            return Err(ConfigError::NonFinite {
                name: "low",
                value: low,
            });
        }
        if high.is_nan() {
            return Err(ConfigError::NonFinite {
                name: "high",
                value: high,
            });
        }
        if low >= high {
            return Err(ConfigError::InvalidLimits { low, high });
        }
        self.limits = Limits { low, high };
        Ok(())
    }

    #[must_use]
    pub fn transform_coefficients(&self) -> Transform {
        self.transform
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// `v * k + b`
    #[must_use]
    pub fn transform(&self, v: f64) -> f64 {
        v * self.transform.k + self.transform.b
    }

    /// `max(low, min(high, v))`
    #[must_use]
    pub fn clamp(&self, v: f64) -> f64 {
        self.limits.low.max(self.limits.high.min(v))
    }

    /// Full pipeline: transform, then clamp.
    #[must_use]
    pub fn condition(&self, v: f64) -> f64 {
        self.clamp(self.transform(v))
    }
}

fn finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { name, value })
    }
}
