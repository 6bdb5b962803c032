//! # hwctl-app
//!
//! Control layer — channels, task admission and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `ActuatorDriver` — device-specific control primitives
//!   - `Pin` / `Bus` — hardware handles checked when a device is built
//!   - `EventPublisher` — sink for channel events
//! - Provide the **device aggregate** and its **channels**, which run every
//!   control value through conditioning and zone classification
//! - Provide the per-channel **task slot** (single-flight admission control)
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `hwctl-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod channel;
pub mod device;
pub mod event_bus;
pub mod ports;
pub mod task_slot;

mod sync;

#[cfg(test)]
mod testing;
