//! Hardware handle ports — bus and pin objects handed to a device.
//!
//! The core never interprets these; it only checks their validity predicate
//! once, when the device is built.

/// A GPIO/PWM pin (or anything pin-like a driver needs).
pub trait Pin: Send + Sync {
    /// Whether this object is a usable pin.
    fn is_pin(&self) -> bool;
}

/// A shared bus (I2C, SPI, UART, …) the device talks over.
pub trait Bus: Send + Sync {
    /// Whether this object is a usable bus.
    fn is_bus(&self) -> bool;
}
