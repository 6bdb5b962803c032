//! # hwctld
//!
//! Composition root that builds simulated actuators and drives them from
//! line commands.
//!
//! ## Responsibilities
//! - Load configuration (`hwctl.toml`, env vars)
//! - Build the simulated devices, apply channel settings, register tasks
//! - Execute operator commands and report the result
//! - Log every bus event
//! - Switch all channels off on shutdown
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no control logic belongs here.

pub mod commands;
pub mod config;
pub mod controller;
pub mod monitor;
