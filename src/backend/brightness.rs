// SPDX-License-Identifier: GPL-3.0-only
//! Hardware brightness backends for the built-in panel

use std::rc::Rc;

use crate::capability::CapabilitySet;
use crate::display::DisplayId;
use crate::system::DisplaySystem;

use super::{Backend, BackendError};

/// Name of the float parameter carrying panel brightness on the hardware service
pub const BRIGHTNESS_PARAMETER: &str = "brightness";

pub trait BrightnessBackend: Backend {
    /// Current brightness in 0.0-1.0
    fn get(&self, display: DisplayId) -> Result<f32, BackendError>;

    /// Set brightness in 0.0-1.0
    fn set(&self, display: DisplayId, level: f32) -> Result<(), BackendError>;
}

/// The privileged brightness service
pub struct PrivateBrightness {
    capabilities: Rc<CapabilitySet>,
}

impl PrivateBrightness {
    pub fn new(capabilities: Rc<CapabilitySet>) -> Self {
        Self { capabilities }
    }
}

impl Backend for PrivateBrightness {
    fn name(&self) -> &'static str {
        "private-brightness"
    }
}

impl BrightnessBackend for PrivateBrightness {
    fn get(&self, display: DisplayId) -> Result<f32, BackendError> {
        let service = self
            .capabilities
            .brightness()
            .get()
            .ok_or(BackendError::Unavailable)?;
        service
            .get(display)
            .ok_or_else(|| BackendError::Failed("brightness query rejected".into()))
    }

    fn set(&self, display: DisplayId, level: f32) -> Result<(), BackendError> {
        let service = self
            .capabilities
            .brightness()
            .get()
            .ok_or(BackendError::Unavailable)?;
        if service.set(display, level) {
            Ok(())
        } else {
            Err(BackendError::Failed("brightness update rejected".into()))
        }
    }
}

/// Legacy path: the brightness float parameter on the display's hardware service
pub struct ParameterBrightness {
    system: Rc<dyn DisplaySystem>,
}

impl ParameterBrightness {
    pub fn new(system: Rc<dyn DisplaySystem>) -> Self {
        Self { system }
    }
}

impl Backend for ParameterBrightness {
    fn name(&self) -> &'static str {
        "display-parameter"
    }
}

impl BrightnessBackend for ParameterBrightness {
    fn get(&self, display: DisplayId) -> Result<f32, BackendError> {
        self.system
            .float_parameter(display, BRIGHTNESS_PARAMETER)
            .ok_or_else(|| BackendError::Failed("no hardware service with a brightness parameter".into()))
    }

    fn set(&self, display: DisplayId, level: f32) -> Result<(), BackendError> {
        if self
            .system
            .set_float_parameter(display, BRIGHTNESS_PARAMETER, level)
        {
            Ok(())
        } else {
            Err(BackendError::Failed("no hardware service with a brightness parameter".into()))
        }
    }
}
