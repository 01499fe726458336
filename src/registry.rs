// SPDX-License-Identifier: GPL-3.0-only
//! Display registry
//!
//! Holds the most recent enumeration snapshot. Records are never edited in
//! place; every refresh builds a new list from the OS.

use crate::capability::CapabilitySet;
use crate::display::{DisplayId, DisplayRecord};
use crate::system::DisplaySystem;

/// Name used for the built-in panel regardless of what the OS reports
pub const BUILTIN_NAME: &str = "Built-in Display";

#[derive(Debug, Default)]
pub struct DisplayRegistry {
    records: Vec<DisplayRecord>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate displays from the OS
    ///
    /// Tries the privileged listing first because it also reports logically
    /// disabled displays. An unavailable capability, an error status or an
    /// empty result all fall back to the public online list.
    pub fn enumerate(
        system: &dyn DisplaySystem,
        capabilities: &CapabilitySet,
        capacity: usize,
    ) -> Vec<DisplayRecord> {
        let privileged = capabilities
            .display_list()
            .get()
            .and_then(|listing| listing.list(capacity))
            .filter(|ids| !ids.is_empty());

        let ids = match privileged {
            Some(ids) => ids,
            None => {
                debug!("Privileged display list unavailable or empty, using online display list");
                match system.online_displays(capacity) {
                    Some(ids) => ids,
                    None => {
                        warn!("Online display list query failed");
                        Vec::new()
                    }
                }
            }
        };

        // The built-in panel can report as offline while disabled and must
        // still be tracked so it can be recovered.
        let mut ids: Vec<DisplayId> = ids
            .into_iter()
            .take(capacity)
            .filter(|&id| id != 0 && (system.is_online(id) || system.is_builtin(id)))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        ids.into_iter()
            .map(|id| DisplayRecord {
                id,
                name: display_name(system, id),
                is_builtin: system.is_builtin(id),
                is_active: system.is_active(id),
            })
            .collect()
    }

    pub fn replace(&mut self, records: Vec<DisplayRecord>) {
        self.records = records;
    }

    pub fn records(&self) -> &[DisplayRecord] {
        &self.records
    }

    pub fn get(&self, id: DisplayId) -> Option<&DisplayRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = DisplayId> + '_ {
        self.records.iter().map(|r| r.id)
    }

    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_active).count()
    }

    pub fn builtin(&self) -> Option<&DisplayRecord> {
        self.records.iter().find(|r| r.is_builtin)
    }

    /// The built-in display, if nothing at all is active
    pub fn recovery_target(&self) -> Option<DisplayId> {
        if self.active_count() == 0 {
            self.builtin().map(|r| r.id)
        } else {
            None
        }
    }
}

/// Human-readable name for a display
pub fn display_name(system: &dyn DisplaySystem, id: DisplayId) -> String {
    if system.is_builtin(id) {
        return BUILTIN_NAME.to_string();
    }
    system
        .localized_name(id)
        .unwrap_or_else(|| format!("External Display ({id})"))
}
