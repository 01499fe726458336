// SPDX-License-Identifier: GPL-3.0-only
//! I2C transports for DDC/CI writes
//!
//! A transport delivers one already-encoded frame to one display in a single
//! synchronous request. There is no retry: repeated writes to real monitors
//! can cause flicker or a momentary blackout.

use std::rc::Rc;

use crate::backend::{Attempt, Backend, BackendError, Chain};
use crate::capability::CapabilitySet;
use crate::ddc::{self, SetVcpFrame};
use crate::display::DisplayTarget;

/// One physical path to a display's DDC/CI bus
pub trait I2cTransport: Backend {
    /// Send `frame` once, expecting no reply
    fn write(&self, target: &DisplayTarget, frame: &SetVcpFrame) -> Result<(), BackendError>;
}

/// The alternate AV-service transport, present only when its capability resolves
pub struct AvServiceTransport {
    capabilities: Rc<CapabilitySet>,
}

impl AvServiceTransport {
    pub fn new(capabilities: Rc<CapabilitySet>) -> Self {
        Self { capabilities }
    }
}

impl Backend for AvServiceTransport {
    fn name(&self) -> &'static str {
        "av-service-i2c"
    }
}

impl I2cTransport for AvServiceTransport {
    fn write(&self, target: &DisplayTarget, frame: &SetVcpFrame) -> Result<(), BackendError> {
        match self.capabilities.av_i2c().get() {
            Some(transport) => transport.write(target, frame),
            None => Err(BackendError::Unavailable),
        }
    }
}

/// Encodes VCP writes and delivers them over the first transport that works
pub struct DdcWriter {
    transports: Chain<dyn I2cTransport>,
}

impl DdcWriter {
    pub fn new(transports: Vec<Box<dyn I2cTransport>>) -> Self {
        Self {
            transports: Chain::new("ddc-write", transports),
        }
    }

    /// Put a transport ahead of the existing ones
    pub fn prepend(&mut self, transport: Box<dyn I2cTransport>) {
        self.transports.prepend(transport);
    }

    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.names()
    }

    /// Write `value` to VCP `control_code` on `target`
    pub fn write(&self, target: &DisplayTarget, control_code: u8, value: u8) -> bool {
        let frame = ddc::encode(control_code, value);
        debug!(display_id = target.id, ?frame, "Sending DDC/CI frame");
        match self.transports.attempt(target.id, |t| t.write(target, &frame)) {
            Attempt::Success { .. } => true,
            Attempt::Exhausted { .. } => {
                warn!(
                    display_id = target.id,
                    control_code,
                    value,
                    "No I2C transport delivered the DDC/CI frame"
                );
                false
            }
        }
    }
}
