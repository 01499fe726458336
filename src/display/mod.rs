// SPDX-License-Identifier: GPL-3.0-only
//! Display data model
//!
//! Records and modes are snapshots: they are rebuilt on every enumeration
//! and never mutated in place.

mod mode;

use serde::Serialize;

pub use mode::{normalize_modes, DisplayMode, ModeHandle, RawMode};

/// OS-assigned display handle, stable for the session
pub type DisplayId = u32;

/// One enumerated display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRecord {
    pub id: DisplayId,
    pub name: String,
    pub is_builtin: bool,
    pub is_active: bool,
}

/// Vendor and product numbers reported for a display
///
/// Used to locate the hardware service behind a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTarget {
    pub id: DisplayId,
    pub vendor: u32,
    pub product: u32,
}
