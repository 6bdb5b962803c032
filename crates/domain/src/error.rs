//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ActuatorError`] via `#[from]`.

use crate::zone::Zone;

/// Top-level error for device and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    /// Invalid configuration supplied by the caller.
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// A device or channel lookup failed.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The device-specific driver reported a failure.
    #[error("driver error")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A configuration value was rejected.
///
/// Returned synchronously by the call that introduced the bad value; the
/// previously stored configuration is always left untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A numeric parameter is NaN or infinite where a finite value is required.
    #[error("{name} must be a finite number, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    /// Clamp bounds are not strictly ordered.
    #[error("limits require low < high, got low={low} high={high}")]
    InvalidLimits { low: f64, high: f64 },

    /// A zone band is not strictly ordered.
    #[error("{band} zone requires low < high, got low={low} high={high}")]
    InvalidZoneRange {
        band: &'static str,
        low: f64,
        high: f64,
    },

    /// The yellow band is not strictly inside the red band.
    #[error(
        "yellow zone [{yellow_low}, {yellow_high}] must lie strictly inside red zone [{red_low}, {red_high}]"
    )]
    ZoneNesting {
        red_low: f64,
        red_high: f64,
        yellow_low: f64,
        yellow_high: f64,
    },

    /// A zone would become reachable without a callback to notify.
    #[error("no callback configured for reachable zone {0}")]
    MissingCallback(Zone),

    /// A required descriptive field is empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A device must expose at least one channel.
    #[error("device must have at least one channel")]
    NoChannels,

    /// The signal list does not match the channel count.
    #[error("expected {expected} signal names, got {actual}")]
    SignalCount { expected: usize, actual: usize },

    /// A pin object failed its validity check.
    #[error("pin {index} is not a valid pin")]
    InvalidPin { index: usize },

    /// The bus object failed its validity check.
    #[error("bus is not a valid bus")]
    InvalidBus,
}

/// A lookup by identifier returned nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
