//! Simulated dimmer with a small register file.
//!
//! Each channel's level (percent) is mirrored into register
//! `LEVEL_BASE + channel`, so it can be read back over the bus interface.

use std::collections::BTreeMap;

use serde_json::Value;

use hwctl_app::ports::ActuatorDriver;
use hwctl_app::ports::driver::DriverResult;

use super::{ChannelState, StateHandle};

/// First register holding a channel level.
pub const LEVEL_BASE: u16 = 0x10;

/// Highest level the dimmer accepts.
pub const MAX_LEVEL: f64 = 100.0;

/// Dimmer accepting levels in `0..=100`.
pub struct VirtualDimmer {
    state: StateHandle,
    registers: BTreeMap<u16, u8>,
}

impl VirtualDimmer {
    pub(crate) fn new(state: StateHandle) -> Self {
        Self {
            state,
            registers: BTreeMap::new(),
        }
    }

    fn level_register(channel: usize) -> DriverResult<u16> {
        u16::try_from(channel)
            .ok()
            .and_then(|c| LEVEL_BASE.checked_add(c))
            .ok_or_else(|| format!("channel {channel} has no level register").into())
    }

    fn set_level(&mut self, channel: usize, level: f64) -> DriverResult<()> {
        let register = Self::level_register(channel)?;
        self.state.update(channel, |s| {
            let on = level > 0.0;
            if s.on != on {
                s.switch_count += 1;
            }
            s.on = on;
            s.level = level;
        })?;
        // level is within 0..=100 here
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let raw = level.round() as u8;
        self.registers.insert(register, raw);
        Ok(())
    }
}

impl ActuatorDriver for VirtualDimmer {
    fn init(&mut self, channels: usize) -> DriverResult<()> {
        self.state.resize(channels);
        self.registers.clear();
        tracing::debug!(channels, "dimmer initialised");
        Ok(())
    }

    fn on(&mut self, channel: usize, value: f64, _opts: &Value) -> DriverResult<()> {
        if !(0.0..=MAX_LEVEL).contains(&value) {
            return Err(format!("level {value} outside 0..={MAX_LEVEL}").into());
        }
        self.set_level(channel, value)
    }

    fn off(&mut self, channel: usize, _opts: &Value) -> DriverResult<()> {
        self.set_level(channel, 0.0)
    }

    fn reset(&mut self, channel: usize, _opts: &Value) -> DriverResult<()> {
        let register = Self::level_register(channel)?;
        self.state.update(channel, |s| *s = ChannelState::default())?;
        self.registers.remove(&register);
        Ok(())
    }

    fn configure_regs(&mut self, channel: usize, opts: &Value) -> DriverResult<()> {
        self.state.update(channel, |s| s.config = opts.clone())
    }

    fn read(&mut self, register: u16, len: usize) -> DriverResult<Vec<u8>> {
        Ok((0..len)
            .map(|offset| {
                u16::try_from(offset)
                    .ok()
                    .and_then(|o| register.checked_add(o))
                    .and_then(|r| self.registers.get(&r).copied())
                    .unwrap_or(0)
            })
            .collect())
    }

    fn write(&mut self, register: u16, data: &[u8]) -> DriverResult<()> {
        for (offset, byte) in data.iter().enumerate() {
            let target = u16::try_from(offset)
                .ok()
                .and_then(|o| register.checked_add(o))
                .ok_or_else(|| format!("write past end of register file at {register:#06x}"))?;
            self.registers.insert(target, *byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimmer(channels: usize) -> (VirtualDimmer, StateHandle) {
        let state = StateHandle::default();
        let mut dimmer = VirtualDimmer::new(state.clone());
        dimmer.init(channels).unwrap();
        (dimmer, state)
    }

    #[test]
    fn should_store_level_and_mirror_register() {
        let (mut dimmer, state) = dimmer(2);
        dimmer.on(1, 42.4, &Value::Null).unwrap();

        let channel = state.channel(1).unwrap();
        assert!(channel.on);
        assert!((channel.level - 42.4).abs() < f64::EPSILON);
        assert_eq!(dimmer.read(LEVEL_BASE, 2).unwrap(), vec![0, 42]);
    }

    #[test]
    fn should_reject_level_out_of_range() {
        let (mut dimmer, state) = dimmer(1);
        let err = dimmer.on(0, 150.0, &Value::Null).unwrap_err();
        assert!(err.to_string().contains("outside"));
        assert!(!state.channel(0).unwrap().on);
    }

    #[test]
    fn should_treat_zero_level_as_off() {
        let (mut dimmer, state) = dimmer(1);
        dimmer.on(0, 0.0, &Value::Null).unwrap();
        assert!(!state.channel(0).unwrap().on);
    }

    #[test]
    fn should_store_configuration_per_channel() {
        let (mut dimmer, state) = dimmer(2);
        dimmer
            .configure_regs(0, &serde_json::json!({"curve": "log"}))
            .unwrap();
        assert_eq!(state.channel(0).unwrap().config["curve"], "log");
        assert_eq!(state.channel(1).unwrap().config, Value::Null);
    }

    #[test]
    fn should_clear_level_register_on_reset() {
        let (mut dimmer, state) = dimmer(1);
        dimmer.on(0, 80.0, &Value::Null).unwrap();
        dimmer.reset(0, &Value::Null).unwrap();
        assert_eq!(dimmer.read(LEVEL_BASE, 1).unwrap(), vec![0]);
        assert_eq!(state.channel(0).unwrap(), ChannelState::default());
    }

    #[test]
    fn should_round_trip_raw_register_writes() {
        let (mut dimmer, _) = dimmer(1);
        dimmer.write(0x40, &[1, 2, 3]).unwrap();
        assert_eq!(dimmer.read(0x3f, 5).unwrap(), vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn should_fail_for_channel_past_init() {
        let (mut dimmer, _) = dimmer(1);
        assert!(dimmer.on(4, 10.0, &Value::Null).is_err());
    }
}
