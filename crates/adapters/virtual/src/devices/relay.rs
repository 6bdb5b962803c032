//! Simulated relay board: every channel is a contact, closed or open.

use serde_json::Value;

use hwctl_app::ports::ActuatorDriver;
use hwctl_app::ports::driver::DriverResult;

use super::{ChannelState, StateHandle};

/// Relay board; any positive control value closes the contact.
pub struct VirtualRelay {
    state: StateHandle,
}

impl VirtualRelay {
    pub(crate) fn new(state: StateHandle) -> Self {
        Self { state }
    }

    fn set(&self, channel: usize, closed: bool) -> DriverResult<()> {
        self.state.update(channel, |s| {
            if s.on != closed {
                s.switch_count += 1;
            }
            s.on = closed;
            s.level = if closed { 1.0 } else { 0.0 };
        })
    }
}

impl ActuatorDriver for VirtualRelay {
    fn init(&mut self, channels: usize) -> DriverResult<()> {
        self.state.resize(channels);
        tracing::debug!(channels, "relay board initialised");
        Ok(())
    }

    fn on(&mut self, channel: usize, value: f64, _opts: &Value) -> DriverResult<()> {
        self.set(channel, value > 0.0)
    }

    fn off(&mut self, channel: usize, _opts: &Value) -> DriverResult<()> {
        self.set(channel, false)
    }

    fn reset(&mut self, channel: usize, _opts: &Value) -> DriverResult<()> {
        self.state.update(channel, |s| *s = ChannelState::default())
    }
}
