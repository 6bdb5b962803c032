//! Channel — one independently controllable line of a device.
//!
//! Every control value passes through a fixed pipeline before it reaches the
//! driver:
//!
//! ```text
//! on(value) → transform → clamp → classify zone (may fire alarm) → driver.on
//! ```
//!
//! `off`, `reset` and `configure` go straight to the driver.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use hwctl_domain::conditioning::SignalConditioner;
use hwctl_domain::error::{ActuatorError, ConfigError};
use hwctl_domain::event::{Event, EventType};
use hwctl_domain::id::ChannelId;
use hwctl_domain::settings::ChannelSettings;
use hwctl_domain::zone::{Zone, ZoneCallback, ZoneClassifier, ZoneSettings, ZoneThresholds, ZoneTransition};

use crate::device::DeviceCore;
use crate::ports::{ActuatorDriver, EventPublisher};
use crate::sync::lock;
use crate::task_slot::{ActiveTask, Invocation, Settler, SlotHooks, TaskSlot};

/// A single channel of a [`Device`](crate::device::Device).
///
/// Obtained from [`Device::channel`](crate::device::Device::channel); the same
/// `Arc` is handed out for a given index every time.
pub struct Channel<D, P> {
    id: ChannelId,
    core: Arc<DeviceCore<D, P>>,
    slot: TaskSlot,
    conditioner: Mutex<SignalConditioner>,
    zones: Mutex<ZoneClassifier>,
}

impl<D, P> Channel<D, P>
where
    D: ActuatorDriver,
    P: EventPublisher + Send + Sync + 'static,
{
    pub(crate) fn new(core: Arc<DeviceCore<D, P>>, index: usize) -> Self {
        let id = ChannelId::new(core.info.name.clone(), index);
        let start_core = Arc::clone(&core);
        let start_id = id.clone();
        let settle_core = Arc::clone(&core);
        let settle_id = id.clone();
        let hooks = SlotHooks {
            on_start: Some(Box::new(move |task| {
                start_core.publish(Event::new(
                    EventType::TaskStarted,
                    Some(start_id.clone()),
                    json!({"task": task}),
                ));
            })),
            on_settle: Some(Box::new(move |task, outcome| {
                let data = match outcome {
                    Ok(value) => json!({"task": task, "ok": true, "value": value}),
                    Err(err) => json!({"task": task, "ok": false, "error": err.to_string()}),
                };
                settle_core.publish(Event::new(EventType::TaskSettled, Some(settle_id.clone()), data));
            })),
        };
        let slot = TaskSlot::with_hooks(id.clone(), hooks);

        Self {
            id,
            core,
            slot,
            conditioner: Mutex::new(SignalConditioner::new()),
            zones: Mutex::new(ZoneClassifier::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.id.index
    }

    /// Signal name declared for this channel, if any.
    #[must_use]
    pub fn signal(&self) -> Option<&str> {
        self.core.info.signal(self.id.index)
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.core.is_on(self.id.index)
    }

    /// Drive the channel with `value`.
    ///
    /// The value is transformed, clamped and classified before the driver
    /// sees it. A zone change invokes the zone callback *before* the driver is
    /// called. Returns the conditioned value that was sent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonFinite`] for a NaN or infinite input and
    /// [`ActuatorError::Driver`] when the driver fails.
    #[tracing::instrument(skip(self, opts), fields(channel = %self.id))]
    pub fn on(&self, value: f64, opts: &Value) -> Result<f64, ActuatorError> {
        if !value.is_finite() {
            return Err(ConfigError::NonFinite {
                name: "value",
                value,
            }
            .into());
        }

        let conditioned = lock(&self.conditioner).condition(value);
        let transition = lock(&self.zones).update(conditioned);
        if let Some(transition) = transition {
            self.announce(&transition, conditioned);
            transition.notify();
        }

        self.core
            .with_driver(|driver| driver.on(self.id.index, conditioned, opts))?;
        self.core.set_status(self.id.index, true);
        self.core.publish(Event::new(
            EventType::ChannelOn,
            Some(self.id.clone()),
            json!({"requested": value, "value": conditioned}),
        ));
        Ok(conditioned)
    }

    /// Switch the channel off.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Driver`] when the driver fails.
    #[tracing::instrument(skip(self, opts), fields(channel = %self.id))]
    pub fn off(&self, opts: &Value) -> Result<(), ActuatorError> {
        self.core
            .with_driver(|driver| driver.off(self.id.index, opts))?;
        self.core.set_status(self.id.index, false);
        self.core.publish(Event::new(
            EventType::ChannelOff,
            Some(self.id.clone()),
            Value::Null,
        ));
        Ok(())
    }

    /// Reset the channel to its power-on state (off).
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Driver`] when the driver fails.
    #[tracing::instrument(skip(self, opts), fields(channel = %self.id))]
    pub fn reset(&self, opts: &Value) -> Result<(), ActuatorError> {
        self.core
            .with_driver(|driver| driver.reset(self.id.index, opts))?;
        self.core.set_status(self.id.index, false);
        self.core.publish(Event::new(
            EventType::ChannelReset,
            Some(self.id.clone()),
            Value::Null,
        ));
        Ok(())
    }

    /// Write the channel's configuration registers.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Driver`] when the driver fails.
    pub fn configure(&self, opts: &Value) -> Result<(), ActuatorError> {
        self.core
            .with_driver(|driver| driver.configure_regs(self.id.index, opts))
    }

    // ── conditioning ───────────────────────────────────────────────

    /// # Errors
    ///
    /// See [`SignalConditioner::set_transform`].
    pub fn set_transform(&self, k: f64, b: f64) -> Result<(), ConfigError> {
        lock(&self.conditioner).set_transform(k, b)
    }

    /// # Errors
    ///
    /// See [`SignalConditioner::set_limits`].
    pub fn set_limits(&self, low: f64, high: f64) -> Result<(), ConfigError> {
        lock(&self.conditioner).set_limits(low, high)
    }

    /// Copy of the channel's conditioning pipeline.
    #[must_use]
    pub fn conditioner(&self) -> SignalConditioner {
        lock(&self.conditioner).clone()
    }

    // ── zones ──────────────────────────────────────────────────────

    /// # Errors
    ///
    /// See [`ZoneClassifier::set_zones`].
    pub fn set_zones(&self, settings: ZoneSettings) -> Result<(), ConfigError> {
        lock(&self.zones).set_zones(settings)
    }

    /// Zone of the last value sent through [`on`](Self::on).
    #[must_use]
    pub fn zone(&self) -> Zone {
        lock(&self.zones).current()
    }

    #[must_use]
    pub fn thresholds(&self) -> ZoneThresholds {
        lock(&self.zones).thresholds()
    }

    /// Apply declarative settings, routing every zone transition to `callback`.
    ///
    /// All-or-nothing: if any part is rejected, neither the conditioner nor
    /// the zones change.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn apply(&self, settings: &ChannelSettings, callback: &ZoneCallback) -> Result<(), ConfigError> {
        let mut conditioner = self.conditioner();
        if let Some(transform) = settings.transform {
            conditioner.set_transform(transform.k, transform.b)?;
        }
        if let Some(limits) = settings.limits {
            conditioner.set_limits(limits.low, limits.high)?;
        }
        if settings.has_zones() {
            lock(&self.zones).set_zones(settings.zone_settings(callback))?;
        }
        *lock(&self.conditioner) = conditioner;
        Ok(())
    }

    // ── tasks ──────────────────────────────────────────────────────

    /// Register a named task on this channel's slot.
    pub fn register_task(
        &self,
        name: impl Into<String>,
        work: impl Fn(Settler, Value) + Send + Sync + 'static,
    ) {
        self.slot.register(name, work);
    }

    /// Remove a task registration; an Active run is not cancelled.
    pub fn remove_task(&self, name: &str) -> bool {
        self.slot.remove(name)
    }

    /// Start task `name` unless another task of this channel is Active.
    ///
    /// `TaskStarted` is published before the work runs; `TaskRejected` once
    /// the slot has refused the task.
    pub fn invoke(&self, name: &str, args: Value) -> Invocation {
        let invocation = self.slot.invoke(name, args);
        if !invocation.accepted() {
            self.core.publish(Event::new(
                EventType::TaskRejected,
                Some(self.id.clone()),
                json!({"task": name}),
            ));
        }
        invocation
    }

    #[must_use]
    pub fn active_task(&self) -> Option<ActiveTask> {
        self.slot.active_task()
    }

    #[must_use]
    pub fn tasks(&self) -> Vec<String> {
        self.slot.registered()
    }

    fn announce(&self, transition: &ZoneTransition, value: f64) {
        if transition.to.is_red() {
            tracing::warn!(channel = %self.id, from = %transition.from, to = %transition.to, value, "entered red zone");
        } else {
            tracing::info!(channel = %self.id, from = %transition.from, to = %transition.to, value, "zone changed");
        }
        self.core.publish(Event::new(
            EventType::ZoneChanged,
            Some(self.id.clone()),
            json!({"from": transition.from, "to": transition.to, "value": value}),
        ));
    }
}

impl<D, P> fmt::Debug for Channel<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
