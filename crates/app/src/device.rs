//! Device — the actuator aggregate owning its channels and driver.
//!
//! A device is built once with a fixed channel count. Channels are created at
//! build time and handed out as shared handles, so asking for the same index
//! twice yields the same channel.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use hwctl_domain::device::DeviceInfo;
use hwctl_domain::error::{ActuatorError, ConfigError, NotFoundError};
use hwctl_domain::event::Event;
use hwctl_domain::id::DeviceId;

use crate::channel::Channel;
use crate::ports::driver::DriverResult;
use crate::ports::event_bus::NoopPublisher;
use crate::ports::{ActuatorDriver, Bus, EventPublisher, Pin};
use crate::sync::lock;

/// State shared between a device and its channels.
pub(crate) struct DeviceCore<D, P> {
    pub(crate) info: DeviceInfo,
    driver: Mutex<D>,
    status: Mutex<Vec<bool>>,
    publisher: P,
}

impl<D: ActuatorDriver, P: EventPublisher> DeviceCore<D, P> {
    pub(crate) fn with_driver<T>(
        &self,
        op: impl FnOnce(&mut D) -> DriverResult<T>,
    ) -> Result<T, ActuatorError> {
        let mut driver = lock(&self.driver);
        op(&mut driver).map_err(ActuatorError::Driver)
    }

    pub(crate) fn set_status(&self, index: usize, on: bool) {
        if let Some(slot) = lock(&self.status).get_mut(index) {
            *slot = on;
        }
    }

    pub(crate) fn is_on(&self, index: usize) -> bool {
        lock(&self.status).get(index).copied().unwrap_or(false)
    }

    pub(crate) fn publish(&self, event: Event) {
        self.publisher.publish(event);
    }
}

/// A multi-channel actuator backed by a driver `D`, reporting to `P`.
pub struct Device<D, P = NoopPublisher> {
    id: DeviceId,
    core: Arc<DeviceCore<D, P>>,
    channels: Vec<Arc<Channel<D, P>>>,
    bus: Option<Arc<dyn Bus>>,
    pins: Vec<Arc<dyn Pin>>,
}

impl<D: ActuatorDriver> Device<D> {
    /// Start building a device from its descriptor and driver.
    pub fn builder(info: DeviceInfo, driver: D) -> DeviceBuilder<D> {
        DeviceBuilder {
            info,
            driver,
            publisher: NoopPublisher,
            bus: None,
            pins: Vec::new(),
        }
    }
}

impl<D, P> Device<D, P>
where
    D: ActuatorDriver,
    P: EventPublisher + Send + Sync + 'static,
{
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.core.info
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.info.name
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The channel at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when `index` is out of range.
    pub fn channel(&self, index: usize) -> Result<Arc<Channel<D, P>>, NotFoundError> {
        self.channels.get(index).map(Arc::clone).ok_or_else(|| NotFoundError {
            entity: "Channel",
            id: format!("{}:{index}", self.core.info.name),
        })
    }

    #[must_use]
    pub fn channels(&self) -> &[Arc<Channel<D, P>>] {
        &self.channels
    }

    /// On/off status of every channel, by index.
    #[must_use]
    pub fn status(&self) -> Vec<bool> {
        lock(&self.core.status).clone()
    }

    #[must_use]
    pub fn bus(&self) -> Option<&Arc<dyn Bus>> {
        self.bus.as_ref()
    }

    #[must_use]
    pub fn pins(&self) -> &[Arc<dyn Pin>] {
        &self.pins
    }

    /// Run the driver's initialisation.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Driver`] when the driver fails.
    #[tracing::instrument(skip(self), fields(device = %self.core.info.name))]
    pub fn init(&self) -> Result<(), ActuatorError> {
        let channels = self.channels.len();
        self.core.with_driver(|driver| driver.init(channels))
    }

    /// Drive channel `index`; see [`Channel::on`].
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::NotFound`] for an unknown index, otherwise
    /// whatever [`Channel::on`] returns.
    pub fn on(&self, index: usize, value: f64, opts: &Value) -> Result<f64, ActuatorError> {
        self.channel(index)?.on(value, opts)
    }

    /// # Errors
    ///
    /// Returns [`ActuatorError::NotFound`] for an unknown index or
    /// [`ActuatorError::Driver`] when the driver fails.
    pub fn off(&self, index: usize, opts: &Value) -> Result<(), ActuatorError> {
        self.channel(index)?.off(opts)
    }

    /// # Errors
    ///
    /// Returns [`ActuatorError::NotFound`] for an unknown index or
    /// [`ActuatorError::Driver`] when the driver fails.
    pub fn reset(&self, index: usize, opts: &Value) -> Result<(), ActuatorError> {
        self.channel(index)?.reset(opts)
    }

    /// # Errors
    ///
    /// Returns [`ActuatorError::NotFound`] for an unknown index or
    /// [`ActuatorError::Driver`] when the driver fails.
    pub fn configure_regs(&self, index: usize, opts: &Value) -> Result<(), ActuatorError> {
        self.channel(index)?.configure(opts)
    }

    /// Switch every channel off, stopping at the first driver failure.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Driver`] when the driver fails.
    pub fn off_all(&self) -> Result<(), ActuatorError> {
        let opts = Value::Null;
        for channel in &self.channels {
            channel.off(&opts)?;
        }
        Ok(())
    }

    /// Raw register read.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Driver`] when the driver fails.
    pub fn read(&self, register: u16, len: usize) -> Result<Vec<u8>, ActuatorError> {
        self.core.with_driver(|driver| driver.read(register, len))
    }

    /// Raw register write.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorError::Driver`] when the driver fails.
    pub fn write(&self, register: u16, data: &[u8]) -> Result<(), ActuatorError> {
        self.core.with_driver(|driver| driver.write(register, data))
    }
}

impl<D, P> fmt::Debug for Device<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("info", &self.core.info)
            .field("pins", &self.pins.len())
            .finish_non_exhaustive()
    }
}

/// Step-by-step builder for [`Device`].
pub struct DeviceBuilder<D, P = NoopPublisher> {
    info: DeviceInfo,
    driver: D,
    publisher: P,
    bus: Option<Arc<dyn Bus>>,
    pins: Vec<Arc<dyn Pin>>,
}

impl<D, P> DeviceBuilder<D, P>
where
    D: ActuatorDriver,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Route this device's events to `publisher`.
    #[must_use]
    pub fn publisher<Q>(self, publisher: Q) -> DeviceBuilder<D, Q>
    where
        Q: EventPublisher + Send + Sync + 'static,
    {
        DeviceBuilder {
            info: self.info,
            driver: self.driver,
            publisher,
            bus: self.bus,
            pins: self.pins,
        }
    }

    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn pin(mut self, pin: Arc<dyn Pin>) -> Self {
        self.pins.push(pin);
        self
    }

    /// Validate everything and create the device with all its channels.
    ///
    /// # Errors
    ///
    /// - any [`DeviceInfo::validate`] error
    /// - [`ConfigError::InvalidBus`] if the bus fails its validity check
    /// - [`ConfigError::InvalidPin`] for the first pin failing its check
    pub fn build(self) -> Result<Device<D, P>, ConfigError> {
        self.info.validate()?;
        if let Some(bus) = &self.bus
            && !bus.is_bus()
        {
            return Err(ConfigError::InvalidBus);
        }
        if let Some(index) = self.pins.iter().position(|pin| !pin.is_pin()) {
            return Err(ConfigError::InvalidPin { index });
        }

        let count = self.info.channels;
        let core = Arc::new(DeviceCore {
            info: self.info,
            driver: Mutex::new(self.driver),
            status: Mutex::new(vec![false; count]),
            publisher: self.publisher,
        });
        let channels = (0..count)
            .map(|index| Arc::new(Channel::new(Arc::clone(&core), index)))
            .collect();

        tracing::debug!(device = %core.info.name, channels = count, "device built");
        Ok(Device {
            id: DeviceId::new(),
            core,
            channels,
            bus: self.bus,
            pins: self.pins,
        })
    }
}
