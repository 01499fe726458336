// SPDX-License-Identifier: GPL-3.0-only
//! Display control engine
//!
//! The engine arbitrates between backends for the three display operations:
//!
//! - **Power**: privileged enable/disable inside a configuration
//!   transaction. Turning a display off is refused outright while one or
//!   fewer displays are active.
//! - **Brightness**: for the built-in panel, the privileged brightness
//!   service and then the hardware brightness parameter. External displays
//!   can be driven over DDC/CI when a transport reaches them.
//! - **Mode**: deduplicated, sorted mode enumeration and transactional mode
//!   switching.
//!
//! Every refresh also enforces recovery: if nothing is active and a built-in
//! panel exists, the panel is switched back on.
//!
//! The engine is single-threaded. All mutating calls go through `&mut self`
//! on one control thread.

use std::rc::Rc;

use tokio::sync::watch;

use crate::backend::{
    Attempt, BrightnessBackend, Chain, ModeBackend, Outcome, ParameterBrightness, PowerBackend,
    PrivateBrightness, PrivateEnablePower, TransactionMode,
};
use crate::capability::CapabilitySet;
use crate::config::Config;
use crate::ddc;
use crate::display::{normalize_modes, DisplayId, DisplayMode, DisplayRecord};
use crate::events::{ChangeReason, Notifier, StateChange};
use crate::i2c::{AvServiceTransport, DdcWriter, I2cTransport};
use crate::registry::{self, DisplayRegistry};
use crate::system::DisplaySystem;

/// Engine tunables, taken from [`Config`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Refresh rate substituted when the OS reports 0 Hz
    pub fallback_refresh_rate: f64,
    /// Maximum number of displays enumerated
    pub display_list_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fallback_refresh_rate: 60.0,
            display_list_capacity: 16,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            fallback_refresh_rate: config.fallback_refresh_rate,
            display_list_capacity: config.display_list_capacity,
        }
    }
}

pub struct DisplayEngine {
    system: Rc<dyn DisplaySystem>,
    capabilities: Rc<CapabilitySet>,
    settings: EngineSettings,
    registry: DisplayRegistry,
    power: Chain<dyn PowerBackend>,
    brightness: Chain<dyn BrightnessBackend>,
    modes: Chain<dyn ModeBackend>,
    ddc: DdcWriter,
    notifier: Notifier,
}

impl DisplayEngine {
    /// Create an engine with the standard backend chains
    ///
    /// The registry starts empty; call [`refresh`](Self::refresh) before
    /// issuing power changes.
    pub fn new(
        system: Rc<dyn DisplaySystem>,
        capabilities: Rc<CapabilitySet>,
        settings: EngineSettings,
    ) -> Self {
        let power: Vec<Box<dyn PowerBackend>> = vec![Box::new(PrivateEnablePower::new(
            system.clone(),
            capabilities.clone(),
        ))];
        let brightness: Vec<Box<dyn BrightnessBackend>> = vec![
            Box::new(PrivateBrightness::new(capabilities.clone())),
            Box::new(ParameterBrightness::new(system.clone())),
        ];
        let modes: Vec<Box<dyn ModeBackend>> = vec![Box::new(TransactionMode::new(system.clone()))];
        let transports: Vec<Box<dyn I2cTransport>> =
            vec![Box::new(AvServiceTransport::new(capabilities.clone()))];

        Self {
            system,
            capabilities,
            settings,
            registry: DisplayRegistry::new(),
            power: Chain::new("power", power),
            brightness: Chain::new("brightness", brightness),
            modes: Chain::new("mode", modes),
            ddc: DdcWriter::new(transports),
            notifier: Notifier::new(),
        }
    }

    /// Put an I2C transport ahead of the capability-backed one
    pub fn with_ddc_transport(mut self, transport: Box<dyn I2cTransport>) -> Self {
        self.ddc.prepend(transport);
        self
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> watch::Receiver<StateChange> {
        self.notifier.subscribe()
    }

    /// Current registry snapshot
    pub fn displays(&self) -> &[DisplayRecord] {
        self.registry.records()
    }

    pub fn display(&self, id: DisplayId) -> Option<&DisplayRecord> {
        self.registry.get(id)
    }

    /// Rebuild the registry snapshot and restore a lit display if none is active
    pub fn refresh(&mut self) -> &[DisplayRecord] {
        self.rebuild_registry();

        if let Some(builtin) = self.registry.recovery_target() {
            warn!(
                display_id = builtin,
                "Recovery: no active displays detected, force enabling built-in display"
            );
            match self.apply_power(builtin, true) {
                Outcome::Applied => self.rebuild_registry(),
                outcome => error!(display_id = builtin, %outcome, "Recovery of built-in display did not apply"),
            }
        }

        info!(
            displays = self.registry.records().len(),
            active = self.registry.active_count(),
            "Display registry refreshed"
        );
        self.notifier.notify(ChangeReason::Refreshed);
        self.registry.records()
    }

    fn rebuild_registry(&mut self) {
        let records = DisplayRegistry::enumerate(
            self.system.as_ref(),
            &self.capabilities,
            self.settings.display_list_capacity,
        );
        self.registry.replace(records);
    }

    /// Live active state of a display
    pub fn is_active(&self, id: DisplayId) -> bool {
        self.system.is_active(id)
    }

    pub fn is_builtin(&self, id: DisplayId) -> bool {
        self.system.is_builtin(id)
    }

    pub fn name(&self, id: DisplayId) -> String {
        registry::display_name(self.system.as_ref(), id)
    }

    /// Enable or disable a display
    ///
    /// Disabling is refused while one or fewer registry displays are active.
    pub fn set_power(&mut self, id: DisplayId, on: bool) -> Outcome {
        info!(display_id = id, builtin = self.is_builtin(id), on, "Set power state");

        if !on {
            let active = self
                .registry
                .ids()
                .filter(|&display| self.system.is_active(display))
                .count();
            if active <= 1 {
                warn!(
                    display_id = id,
                    active, "Safety: refusing to disable the last active display"
                );
                return Outcome::Refused;
            }
        }

        let outcome = self.apply_power(id, on);
        if outcome == Outcome::Applied {
            self.rebuild_registry();
            self.notifier.notify(ChangeReason::Power);
        }
        outcome
    }

    fn apply_power(&self, id: DisplayId, on: bool) -> Outcome {
        let attempt = self.power.attempt(id, |b| b.set_power(id, on));
        let outcome = attempt.outcome();
        if outcome == Outcome::Unavailable {
            info!(display_id = id, "No power control available, ignoring request");
        }
        outcome
    }

    /// Current hardware brightness of the built-in panel
    pub fn get_brightness(&self, id: DisplayId) -> Option<f32> {
        if !self.is_builtin(id) {
            return None;
        }
        self.brightness.attempt(id, |b| b.get(id)).value()
    }

    /// Set hardware brightness of the built-in panel, level in 0.0-1.0
    ///
    /// External displays are ignored here; see
    /// [`set_external_brightness`](Self::set_external_brightness).
    pub fn set_brightness(&mut self, id: DisplayId, level: f32) -> Outcome {
        if !self.is_builtin(id) {
            debug!(display_id = id, "Hardware brightness path only covers the built-in display");
            return Outcome::Unavailable;
        }
        let level = level.clamp(0.0, 1.0);
        let outcome = self.brightness.attempt(id, |b| b.set(id, level)).outcome();
        if outcome == Outcome::Applied {
            self.notifier.notify(ChangeReason::Brightness);
        }
        outcome
    }

    /// Set brightness of any display over DDC/CI, level in 0.0-1.0
    pub fn set_external_brightness(&mut self, id: DisplayId, level: f32) -> Outcome {
        let target = self.system.target(id);
        if self
            .ddc
            .write(&target, ddc::BRIGHTNESS_CODE, ddc::brightness_value(level))
        {
            self.notifier.notify(ChangeReason::Brightness);
            Outcome::Applied
        } else {
            Outcome::Failed
        }
    }

    /// Distinct modes of a display, highest fidelity first
    pub fn get_modes(&self, id: DisplayId) -> Vec<DisplayMode> {
        normalize_modes(
            self.system.all_modes(id),
            self.settings.fallback_refresh_rate,
        )
    }

    /// The offered mode with these visible characteristics, from a fresh enumeration
    pub fn find_mode(
        &self,
        id: DisplayId,
        width: u32,
        height: u32,
        refresh_rate: f64,
    ) -> Option<DisplayMode> {
        self.get_modes(id)
            .into_iter()
            .find(|mode| mode.matches(width, height, refresh_rate))
    }

    pub fn current_mode(&self, id: DisplayId) -> Option<DisplayMode> {
        self.system
            .current_mode(id)
            .map(|raw| DisplayMode::from_raw(raw, self.settings.fallback_refresh_rate))
    }

    /// Switch a display to `mode`
    ///
    /// `mode` should come from a current enumeration; handles from an older
    /// one are passed to the OS unchecked.
    pub fn set_mode(&mut self, id: DisplayId, mode: &DisplayMode) -> Outcome {
        info!(display_id = id, %mode, "Set display mode");
        let attempt = self.modes.attempt(id, |b| b.apply(id, mode));
        if let Attempt::Success { .. } = attempt {
            self.notifier.notify(ChangeReason::Mode);
        }
        attempt.outcome()
    }
}

impl std::fmt::Debug for DisplayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayEngine")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("power", &self.power)
            .field("brightness", &self.brightness)
            .field("modes", &self.modes)
            .finish()
    }
}
