// SPDX-License-Identifier: GPL-3.0-only
//! Mode switching backends

use std::rc::Rc;

use crate::display::{DisplayId, DisplayMode};
use crate::system::DisplaySystem;

use super::{Backend, BackendError};

pub trait ModeBackend: Backend {
    fn apply(&self, display: DisplayId, mode: &DisplayMode) -> Result<(), BackendError>;
}

/// Applies a mode handle through a public configuration transaction
///
/// A handle from an outdated enumeration is passed through as-is; whatever
/// the OS does with it is the result.
pub struct TransactionMode {
    system: Rc<dyn DisplaySystem>,
}

impl TransactionMode {
    pub fn new(system: Rc<dyn DisplaySystem>) -> Self {
        Self { system }
    }
}

impl Backend for TransactionMode {
    fn name(&self) -> &'static str {
        "display-configuration"
    }
}

impl ModeBackend for TransactionMode {
    fn apply(&self, display: DisplayId, mode: &DisplayMode) -> Result<(), BackendError> {
        let mut transaction = self
            .system
            .begin_configuration()
            .ok_or_else(|| BackendError::Failed("could not begin display configuration".into()))?;

        if !transaction.configure_mode(display, &mode.handle) {
            transaction.cancel();
            return Err(BackendError::Failed(format!("mode {mode} rejected")));
        }
        if transaction.commit() {
            Ok(())
        } else {
            Err(BackendError::Failed("configuration commit rejected".into()))
        }
    }
}
