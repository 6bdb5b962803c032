//! Driver port — the device-specific control primitives.
//!
//! Every method is an extension point with a no-op default, so a driver can
//! be brought up incrementally: calling a primitive the driver has not
//! implemented yet succeeds and does nothing.

use serde_json::Value;

/// Error type returned by driver primitives.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for driver primitives.
pub type DriverResult<T> = Result<T, DriverError>;

/// Device-specific primitives a concrete actuator driver overrides.
///
/// `channel` is always a valid index for the owning device; values passed to
/// [`on`](Self::on) have already been conditioned and classified.
pub trait ActuatorDriver: Send + 'static {
    /// Bring the hardware into a known state.
    fn init(&mut self, _channels: usize) -> DriverResult<()> {
        Ok(())
    }

    /// Drive `channel` with the conditioned control `value`.
    fn on(&mut self, _channel: usize, _value: f64, _opts: &Value) -> DriverResult<()> {
        Ok(())
    }

    /// Switch `channel` off.
    fn off(&mut self, _channel: usize, _opts: &Value) -> DriverResult<()> {
        Ok(())
    }

    /// Reset `channel` to its power-on state.
    fn reset(&mut self, _channel: usize, _opts: &Value) -> DriverResult<()> {
        Ok(())
    }

    /// Write channel configuration registers.
    fn configure_regs(&mut self, _channel: usize, _opts: &Value) -> DriverResult<()> {
        Ok(())
    }

    /// Read `len` bytes starting at `register`.
    fn read(&mut self, _register: u16, _len: usize) -> DriverResult<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Write `data` starting at `register`.
    fn write(&mut self, _register: u16, _data: &[u8]) -> DriverResult<()> {
        Ok(())
    }
}

/// Driver that overrides nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDriver;

impl ActuatorDriver for NullDriver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_treat_unimplemented_primitives_as_no_ops() {
        let mut driver = NullDriver;
        let opts = serde_json::json!({});
        assert!(driver.init(2).is_ok());
        assert!(driver.on(0, 1.0, &opts).is_ok());
        assert!(driver.off(0, &opts).is_ok());
        assert!(driver.reset(1, &opts).is_ok());
        assert!(driver.configure_regs(1, &opts).is_ok());
        assert!(driver.write(0x10, &[1, 2]).is_ok());
        assert!(driver.read(0x10, 2).unwrap().is_empty());
    }
}
