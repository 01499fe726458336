// SPDX-License-Identifier: GPL-3.0-only
//! Power (logical enable/disable) backends

use std::rc::Rc;

use crate::capability::CapabilitySet;
use crate::display::DisplayId;
use crate::system::DisplaySystem;

use super::{Backend, BackendError};

pub trait PowerBackend: Backend {
    fn set_power(&self, display: DisplayId, on: bool) -> Result<(), BackendError>;
}

/// Privileged enable/disable inside a configuration transaction
///
/// The transaction is committed permanently when the privileged call
/// succeeds and cancelled otherwise.
pub struct PrivateEnablePower {
    system: Rc<dyn DisplaySystem>,
    capabilities: Rc<CapabilitySet>,
}

impl PrivateEnablePower {
    pub fn new(system: Rc<dyn DisplaySystem>, capabilities: Rc<CapabilitySet>) -> Self {
        Self {
            system,
            capabilities,
        }
    }
}

impl Backend for PrivateEnablePower {
    fn name(&self) -> &'static str {
        "private-display-enable"
    }
}

impl PowerBackend for PrivateEnablePower {
    fn set_power(&self, display: DisplayId, on: bool) -> Result<(), BackendError> {
        let Some(enabler) = self.capabilities.display_enable().get() else {
            return Err(BackendError::Unavailable);
        };

        let transaction = self
            .system
            .begin_configuration()
            .ok_or_else(|| BackendError::Failed("could not begin display configuration".into()))?;

        match enabler.set_enabled(transaction.as_ref(), display, on) {
            Ok(()) => {
                if transaction.commit() {
                    Ok(())
                } else {
                    Err(BackendError::Failed("configuration commit rejected".into()))
                }
            }
            Err(status) => {
                transaction.cancel();
                Err(BackendError::Failed(format!("enable call returned {status}")))
            }
        }
    }
}
