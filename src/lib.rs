//! PlantOps sensor node firmware library.
//!
//! Exposes the lifecycle core and its adapters for integration testing.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;

pub mod pins;

// The ESP-only halves are cfg-gated inside each module; host builds get
// the simulation backends.
pub mod adapters;
pub mod drivers;
pub mod sensors;

/// Firmware version reported at registration and in the boot banner.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
