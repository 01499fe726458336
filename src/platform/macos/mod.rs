// SPDX-License-Identifier: GPL-3.0-only
//! macOS implementation of the display subsystem, capabilities and overlays

mod daemon;
mod ffi;
mod iokit;
mod overlay;
mod private;
mod system;

use std::rc::Rc;

use crate::capability::CapabilitySet;
use crate::config::Config;
use crate::engine::{DisplayEngine, EngineSettings};

pub use daemon::run_daemon;
pub use iokit::FramebufferI2c;
pub use overlay::AppKitHost;
pub use private::PrivateFrameworks;
pub use system::CoreGraphicsSystem;

/// Engine wired to CoreGraphics, the private frameworks and both DDC transports
pub fn open_engine(config: &Config) -> DisplayEngine {
    let capabilities = Rc::new(CapabilitySet::new(Box::new(PrivateFrameworks)));
    DisplayEngine::new(
        Rc::new(CoreGraphicsSystem::new()),
        capabilities,
        EngineSettings::from(config),
    )
    .with_ddc_transport(Box::new(FramebufferI2c))
}
