// SPDX-License-Identifier: GPL-3.0-only
//! Display control engine
//!
//! Controls power state, brightness and resolution of attached displays by
//! arbitrating between several control paths of varying availability:
//! privileged system services, DDC/CI over I2C, and a software dimming
//! overlay as the last resort. Never disables the last active display.

#[macro_use]
extern crate tracing;

pub mod backend;
pub mod capability;
pub mod config;
pub mod controller;
pub mod ddc;
pub mod display;
pub mod engine;
pub mod error;
pub mod events;
pub mod i2c;
pub mod overlay;
pub mod platform;
pub mod registry;
pub mod system;

#[cfg(test)]
mod testing;

pub use backend::Outcome;
pub use config::Config;
pub use controller::{Command, Controller};
pub use display::{DisplayId, DisplayMode, DisplayRecord};
pub use engine::{DisplayEngine, EngineSettings};
pub use error::{EngineError, Result};
