//! Test doubles shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::ports::ActuatorDriver;
use crate::ports::driver::DriverResult;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Init(usize),
    On(usize, f64),
    Off(usize),
    Reset(usize),
    Configure(usize),
}

pub(crate) type Calls = Arc<Mutex<Vec<Call>>>;

/// Driver that records every primitive call.
pub(crate) struct RecordingDriver {
    calls: Calls,
    pub(crate) fail_on: bool,
}

impl RecordingDriver {
    pub(crate) fn new() -> (Self, Calls) {
        let calls = Calls::default();
        let driver = Self {
            calls: Arc::clone(&calls),
            fail_on: false,
        };
        (driver, calls)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ActuatorDriver for RecordingDriver {
    fn init(&mut self, channels: usize) -> DriverResult<()> {
        self.record(Call::Init(channels));
        Ok(())
    }

    fn on(&mut self, channel: usize, value: f64, _opts: &Value) -> DriverResult<()> {
        if self.fail_on {
            return Err("driver refused".into());
        }
        self.record(Call::On(channel, value));
        Ok(())
    }

    fn off(&mut self, channel: usize, _opts: &Value) -> DriverResult<()> {
        self.record(Call::Off(channel));
        Ok(())
    }

    fn reset(&mut self, channel: usize, _opts: &Value) -> DriverResult<()> {
        self.record(Call::Reset(channel));
        Ok(())
    }

    fn configure_regs(&mut self, channel: usize, _opts: &Value) -> DriverResult<()> {
        self.record(Call::Configure(channel));
        Ok(())
    }
}
