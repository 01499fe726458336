// SPDX-License-Identifier: GPL-3.0-only
//! The OS display subsystem as seen by the engine
//!
//! Everything here is a public, always-present OS facility. Optional and
//! undocumented services live behind [`crate::capability`] instead.

use std::ffi::c_void;

use crate::display::{DisplayId, DisplayTarget, ModeHandle, RawMode};

/// Raw handle of an open configuration transaction, for privileged calls
/// that must run inside it
#[derive(Debug, Clone, Copy)]
pub struct RawConfigRef(pub *mut c_void);

/// An open display-configuration transaction
///
/// Implementations must cancel the transaction when dropped without an
/// explicit [`commit`](ConfigTransaction::commit) or
/// [`cancel`](ConfigTransaction::cancel).
pub trait ConfigTransaction {
    fn raw(&self) -> RawConfigRef;

    /// Stage a mode change inside this transaction
    fn configure_mode(&mut self, display: DisplayId, mode: &ModeHandle) -> bool;

    /// Apply all staged changes permanently
    fn commit(self: Box<Self>) -> bool;

    /// Discard all staged changes
    fn cancel(self: Box<Self>);
}

/// Queries and primitives of the OS display subsystem
pub trait DisplaySystem {
    /// Public list of online displays, `None` if the call failed
    fn online_displays(&self, capacity: usize) -> Option<Vec<DisplayId>>;

    fn is_online(&self, display: DisplayId) -> bool;

    fn is_active(&self, display: DisplayId) -> bool;

    fn is_builtin(&self, display: DisplayId) -> bool;

    /// Vendor and product numbers the OS reports for this display
    fn target(&self, display: DisplayId) -> DisplayTarget;

    /// The name the window system shows for this display, if any
    fn localized_name(&self, display: DisplayId) -> Option<String>;

    fn begin_configuration(&self) -> Option<Box<dyn ConfigTransaction + '_>>;

    /// Every mode handle the OS reports, redundant variants included
    fn all_modes(&self, display: DisplayId) -> Vec<RawMode>;

    fn current_mode(&self, display: DisplayId) -> Option<RawMode>;

    /// Read a named float parameter on the display's hardware service
    fn float_parameter(&self, display: DisplayId, key: &str) -> Option<f32>;

    /// Write a named float parameter on the display's hardware service
    fn set_float_parameter(&self, display: DisplayId, key: &str, value: f32) -> bool;
}
