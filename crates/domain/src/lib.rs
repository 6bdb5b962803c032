//! # hwctl-domain
//!
//! Pure domain model for the hwctl actuator control layer.
//!
//! ## Responsibilities
//! - Foundational types: identifiers, error conventions, timestamps
//! - **Signal conditioning**: linear transform then clamp, applied to every
//!   control value before it reaches hardware
//! - **Zone classification**: red/yellow/green alarm bands with edge-triggered
//!   callbacks
//! - **Device descriptors**: validated descriptive properties of a device
//! - **Channel settings**: declarative conditioning/zone configuration
//! - **Events**: records of channel activity
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! Hardware access is expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod conditioning;
pub mod device;
pub mod event;
pub mod settings;
pub mod zone;
