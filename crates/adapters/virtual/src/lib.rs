//! # hwctl-adapter-virtual
//!
//! Simulated actuator drivers for tests and demonstration.
//!
//! ## Provided drivers
//!
//! | Kind | Driver | Behaviour |
//! |------|--------|-----------|
//! | `relay` | [`VirtualRelay`] | Contact closes for any positive value; one pin per channel |
//! | `dimmer` | [`VirtualDimmer`] | Level `0..=100`, mirrored into a register file on a simulated bus |
//!
//! ## Dependency rule
//!
//! Depends on `hwctl-app` (port traits) and `hwctl-domain` only.

mod devices;

use std::sync::Arc;

pub use devices::{
    ChannelState, DriverKind, LEVEL_BASE, MAX_LEVEL, StateHandle, VirtualDimmer, VirtualDriver,
    VirtualRelay,
};

use hwctl_app::device::Device;
use hwctl_app::ports::{Bus, EventPublisher, Pin};
use hwctl_domain::device::DeviceInfo;
use hwctl_domain::error::ActuatorError;

/// Simulated bus; usable whenever it has a name.
#[derive(Debug, Clone)]
pub struct VirtualBus {
    name: String,
}

impl VirtualBus {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Bus for VirtualBus {
    fn is_bus(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Simulated GPIO line.
#[derive(Debug, Clone, Copy)]
pub struct VirtualPin {
    pub number: u8,
}

impl Pin for VirtualPin {
    fn is_pin(&self) -> bool {
        true
    }
}

/// Build and initialise a simulated device of the given kind.
///
/// Relays get one pin per channel, dimmers sit on a bus. Returns the device
/// together with the handle observing its driver's channel states.
///
/// # Errors
///
/// Returns [`ActuatorError::Config`] when `info` is invalid, or
/// [`ActuatorError::Driver`] when initialisation fails.
pub fn build_device<P>(
    info: DeviceInfo,
    kind: DriverKind,
    publisher: P,
) -> Result<(Device<VirtualDriver, P>, StateHandle), ActuatorError>
where
    P: EventPublisher + Send + Sync + 'static,
{
    let (driver, state) = VirtualDriver::new(kind);
    let channels = info.channels;
    let name = info.name.clone();
    let mut builder = Device::builder(info, driver).publisher(publisher);
    match kind {
        DriverKind::Relay => {
            for number in 0..channels {
                let number = u8::try_from(number).map_err(|_| {
                    ActuatorError::Driver(format!("relay {name} has more channels than pins").into())
                })?;
                builder = builder.pin(Arc::new(VirtualPin { number }));
            }
        }
        DriverKind::Dimmer => {
            builder = builder.bus(Arc::new(VirtualBus::new(format!("sim-i2c/{name}"))));
        }
    }

    let device = builder.build()?;
    device.init()?;
    tracing::info!(device = %device.name(), ?kind, channels, "virtual device ready");
    Ok((device, state))
}
