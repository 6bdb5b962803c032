//! Simulated drivers and the state handle tests use to observe them.
//!
//! A driver is moved into its [`Device`](hwctl_app::device::Device), so each
//! one shares its channel state through a [`StateHandle`] that stays with the
//! caller.

mod dimmer;
mod relay;

pub use dimmer::{LEVEL_BASE, MAX_LEVEL, VirtualDimmer};
pub use relay::VirtualRelay;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hwctl_app::ports::ActuatorDriver;
use hwctl_app::ports::driver::DriverResult;

/// Which simulated driver backs a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Relay,
    Dimmer,
}

/// Observable state of one simulated channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pub on: bool,
    pub level: f64,
    pub config: Value,
    pub switch_count: u64,
}

/// Shared view of a driver's channel states.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    channels: Arc<Mutex<Vec<ChannelState>>>,
}

impl StateHandle {
    /// Copy of every channel's state.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChannelState> {
        self.lock().clone()
    }

    #[must_use]
    pub fn channel(&self, index: usize) -> Option<ChannelState> {
        self.lock().get(index).cloned()
    }

    pub(crate) fn resize(&self, channels: usize) {
        let mut states = self.lock();
        states.clear();
        states.resize_with(channels, ChannelState::default);
    }

    pub(crate) fn update<T>(
        &self,
        index: usize,
        op: impl FnOnce(&mut ChannelState) -> T,
    ) -> DriverResult<T> {
        let mut states = self.lock();
        let count = states.len();
        let state = states
            .get_mut(index)
            .ok_or_else(|| format!("channel {index} out of range (driver has {count})"))?;
        Ok(op(state))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChannelState>> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wrapper enum for the concrete simulated drivers.
pub enum VirtualDriver {
    Relay(VirtualRelay),
    Dimmer(VirtualDimmer),
}

impl VirtualDriver {
    /// Create a driver of the given kind along with its state handle.
    #[must_use]
    pub fn new(kind: DriverKind) -> (Self, StateHandle) {
        let state = StateHandle::default();
        let driver = match kind {
            DriverKind::Relay => Self::Relay(VirtualRelay::new(state.clone())),
            DriverKind::Dimmer => Self::Dimmer(VirtualDimmer::new(state.clone())),
        };
        (driver, state)
    }

    #[must_use]
    pub fn kind(&self) -> DriverKind {
        match self {
            Self::Relay(_) => DriverKind::Relay,
            Self::Dimmer(_) => DriverKind::Dimmer,
        }
    }
}

impl ActuatorDriver for VirtualDriver {
    fn init(&mut self, channels: usize) -> DriverResult<()> {
        match self {
            Self::Relay(d) => d.init(channels),
            Self::Dimmer(d) => d.init(channels),
        }
    }

    fn on(&mut self, channel: usize, value: f64, opts: &Value) -> DriverResult<()> {
        match self {
            Self::Relay(d) => d.on(channel, value, opts),
            Self::Dimmer(d) => d.on(channel, value, opts),
        }
    }

    fn off(&mut self, channel: usize, opts: &Value) -> DriverResult<()> {
        match self {
            Self::Relay(d) => d.off(channel, opts),
            Self::Dimmer(d) => d.off(channel, opts),
        }
    }

    fn reset(&mut self, channel: usize, opts: &Value) -> DriverResult<()> {
        match self {
            Self::Relay(d) => d.reset(channel, opts),
            Self::Dimmer(d) => d.reset(channel, opts),
        }
    }

    fn configure_regs(&mut self, channel: usize, opts: &Value) -> DriverResult<()> {
        match self {
            Self::Relay(d) => d.configure_regs(channel, opts),
            Self::Dimmer(d) => d.configure_regs(channel, opts),
        }
    }

    fn read(&mut self, register: u16, len: usize) -> DriverResult<Vec<u8>> {
        match self {
            Self::Relay(d) => d.read(register, len),
            Self::Dimmer(d) => d.read(register, len),
        }
    }

    fn write(&mut self, register: u16, data: &[u8]) -> DriverResult<()> {
        match self {
            Self::Relay(d) => d.write(register, data),
            Self::Dimmer(d) => d.write(register, data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_driver_of_requested_kind() {
        let (relay, _) = VirtualDriver::new(DriverKind::Relay);
        let (dimmer, _) = VirtualDriver::new(DriverKind::Dimmer);
        assert_eq!(relay.kind(), DriverKind::Relay);
        assert_eq!(dimmer.kind(), DriverKind::Dimmer);
    }

    #[test]
    fn should_deserialize_kind_from_snake_case() {
        let kind: DriverKind = serde_json::from_str("\"dimmer\"").unwrap();
        assert_eq!(kind, DriverKind::Dimmer);
    }

    #[test]
    fn should_report_out_of_range_channel() {
        let handle = StateHandle::default();
        handle.resize(1);
        assert!(handle.update(0, |s| s.on = true).is_ok());
        let err = handle.update(3, |s| s.on = true).unwrap_err();
        assert!(err.to_string().contains("channel 3 out of range"));
    }
}
