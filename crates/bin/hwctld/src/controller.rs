//! Controller — owns the simulated devices and executes commands on them.

use std::error::Error;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use hwctl_adapter_virtual::{StateHandle, VirtualDriver, build_device};
use hwctl_app::channel::Channel;
use hwctl_app::device::Device;
use hwctl_app::event_bus::InProcessEventBus;
use hwctl_app::task_slot::{Invocation, TaskError};
use hwctl_domain::error::{ActuatorError, NotFoundError};
use hwctl_domain::id::ChannelId;
use hwctl_domain::zone::{Zone, ZoneCallback, ZoneRange};

use crate::commands::Command;
use crate::config::{ChannelConfig, Config};

/// Name every channel's pulse task is registered under.
pub const PULSE_TASK: &str = "pulse";

pub type RigDevice = Device<VirtualDriver, InProcessEventBus>;
pub type RigChannel = Channel<VirtualDriver, InProcessEventBus>;

/// Errors from executing a command.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// What a command produced.
#[derive(Debug)]
pub enum Outcome {
    /// Finished; text for the operator.
    Reply(String),
    /// A task was admitted and is still running.
    Started(Invocation),
    /// The operator asked to stop.
    Quit,
}

struct Rig {
    device: RigDevice,
    state: StateHandle,
}

/// All configured devices, in configuration order.
pub struct Controller {
    rigs: Vec<Rig>,
}

impl Controller {
    /// Build, initialise and configure every device in `config`, publishing
    /// their events to `bus`.
    ///
    /// # Errors
    ///
    /// Returns the first device that fails to build or a channel whose
    /// settings are rejected.
    pub fn build(config: &Config, bus: &InProcessEventBus) -> Result<Self, ActuatorError> {
        let mut rigs = Vec::with_capacity(config.devices.len());
        for device_config in &config.devices {
            let (device, state) =
                build_device(device_config.info.clone(), device_config.driver, bus.clone())?;
            for channel in device.channels() {
                let channel_config = device_config.channel(channel.index());
                if let Some(channel_config) = channel_config {
                    channel.apply(&channel_config.settings, &zone_logger(channel.id().clone()))?;
                }
                register_pulse(channel, channel_config);
            }
            rigs.push(Rig { device, state });
        }
        Ok(Self { rigs })
    }

    /// Look up a device by name.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown name.
    pub fn device(&self, name: &str) -> Result<&RigDevice, NotFoundError> {
        self.rig(name).map(|rig| &rig.device)
    }

    /// State handle of a device's simulated driver.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown name.
    pub fn driver_state(&self, name: &str) -> Result<&StateHandle, NotFoundError> {
        self.rig(name).map(|rig| &rig.state)
    }

    pub fn devices(&self) -> impl Iterator<Item = &RigDevice> {
        self.rigs.iter().map(|rig| &rig.device)
    }

    /// Execute one command.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError`] when the device or channel does not exist, the
    /// value is rejected, the driver fails, or a task cannot be started.
    pub async fn execute(&self, command: Command) -> Result<Outcome, ControlError> {
        let outcome = match command {
            Command::On {
                device,
                channel,
                value,
            } => {
                let channel = self.channel(&device, channel)?;
                let sent = channel.on(value, &Value::Null)?;
                Outcome::Reply(format!("{} on {sent} ({})", channel.id(), channel.zone()))
            }
            Command::Off { device, channel } => {
                let channel = self.channel(&device, channel)?;
                channel.off(&Value::Null)?;
                Outcome::Reply(format!("{} off", channel.id()))
            }
            Command::Reset { device, channel } => {
                let channel = self.channel(&device, channel)?;
                channel.reset(&Value::Null)?;
                Outcome::Reply(format!("{} reset", channel.id()))
            }
            Command::Pulse {
                device,
                channel,
                ms,
            } => {
                let channel = self.channel(&device, channel)?;
                let args = ms.map_or_else(|| json!({}), |ms| json!({ "ms": ms }));
                let invocation = channel.invoke(PULSE_TASK, args);
                if invocation.accepted() {
                    Outcome::Started(invocation)
                } else {
                    // rejected invocations are already settled
                    let value = invocation.await?;
                    Outcome::Reply(value.to_string())
                }
            }
            Command::Status { device } => Outcome::Reply(self.status(&device)?),
            Command::Zone { device, channel } => {
                let channel = self.channel(&device, channel)?;
                let thresholds = channel.thresholds();
                let mut line = format!(
                    "{} zone={} red={} yellow={}",
                    channel.id(),
                    channel.zone(),
                    describe_range(thresholds.red),
                    describe_range(thresholds.yellow),
                );
                if let Some(signal) = channel.signal() {
                    let _ = write!(line, " signal={signal}");
                }
                Outcome::Reply(line)
            }
            Command::Quit => Outcome::Quit,
        };
        Ok(outcome)
    }

    /// Switch every channel of every device off, logging failures.
    pub fn shutdown(&self) {
        for rig in &self.rigs {
            if let Err(err) = rig.device.off_all() {
                tracing::error!(device = %rig.device.name(), error = %error_chain(&err), "failed to switch device off");
            }
        }
        tracing::info!(devices = self.rigs.len(), "all channels off");
    }

    fn rig(&self, name: &str) -> Result<&Rig, NotFoundError> {
        self.rigs
            .iter()
            .find(|rig| rig.device.name() == name)
            .ok_or_else(|| NotFoundError {
                entity: "Device",
                id: name.to_string(),
            })
    }

    fn channel(&self, device: &str, index: usize) -> Result<Arc<RigChannel>, NotFoundError> {
        self.device(device)?.channel(index)
    }

    fn status(&self, name: &str) -> Result<String, NotFoundError> {
        let device = self.device(name)?;
        let mut line = format!("{} [{}]", device.name(), device.info().kind);
        for channel in device.channels() {
            let state = if channel.is_on() { "on" } else { "off" };
            let _ = write!(line, " {}={state}/{}", channel.index(), channel.zone());
            if let Some(task) = channel.active_task() {
                let _ = write!(line, "/{}", task.name);
            }
        }
        Ok(line)
    }
}

/// Render an error and all its sources on one line.
#[must_use]
pub fn error_chain(err: &dyn Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(text, ": {cause}");
        source = cause.source();
    }
    text
}

fn describe_range(range: Option<ZoneRange>) -> String {
    range.map_or_else(|| "-".to_string(), |r| format!("{}..{}", r.low, r.high))
}

fn zone_logger(id: ChannelId) -> ZoneCallback {
    Arc::new(move |left: Zone| tracing::info!(channel = %id, %left, "zone callback"))
}

/// Register the `pulse` task: drive the channel, wait, switch it off.
///
/// Arguments `{"ms": u64, "value": f64}` override the configured defaults.
fn register_pulse(channel: &Arc<RigChannel>, config: Option<&ChannelConfig>) {
    let default_ms = config.map_or(500, |c| c.pulse_ms);
    let default_level = config.map_or(1.0, |c| c.pulse_level);
    let weak = Arc::downgrade(channel);

    channel.register_task(PULSE_TASK, move |settler, args| {
        let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(default_ms);
        let level = args
            .get("value")
            .and_then(Value::as_f64)
            .unwrap_or(default_level);
        let weak = weak.clone();

        tokio::spawn(async move {
            let Some(channel) = weak.upgrade() else {
                settler.reject("channel dropped");
                return;
            };
            tracing::debug!(channel = %channel.id(), task = settler.task(), ms, level, "pulse running");
            if let Err(err) = channel.on(level, &Value::Null) {
                settler.reject(error_chain(&err));
                return;
            }
            drop(channel);

            tokio::time::sleep(Duration::from_millis(ms)).await;

            let Some(channel) = weak.upgrade() else {
                settler.reject("channel dropped");
                return;
            };
            match channel.off(&Value::Null) {
                Ok(()) => settler.resolve(json!({ "ms": ms, "value": level })),
                Err(err) => settler.reject(error_chain(&err)),
            }
        });
    });
}
