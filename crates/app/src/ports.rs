//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the control core and the hardware.
//! Concrete drivers live in adapter crates and depend on this crate, never
//! the reverse.

pub mod driver;
pub mod event_bus;
pub mod hardware;

pub use driver::ActuatorDriver;
pub use event_bus::EventPublisher;
pub use hardware::{Bus, Pin};
