// SPDX-License-Identifier: GPL-3.0-only
//! Single mutator entry point for the presentation layer
//!
//! The controller owns the engine and the dimming overlays and routes every
//! mutating command to the right path. Commands can be built directly or
//! parsed from text lines:
//!
//! ```text
//! refresh
//! power 2 off
//! brightness 1 0.4
//! mode 1 2560x1440@60
//! ```

use std::str::FromStr;

use crate::backend::Outcome;
use crate::config::Config;
use crate::display::DisplayId;
use crate::engine::DisplayEngine;
use crate::error::EngineError;
use crate::events::ChangeReason;
use crate::overlay::OverlayManager;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Re-enumerate displays and resync overlays
    Refresh,
    SetPower { display: DisplayId, on: bool },
    /// Level in 0.0-1.0
    SetBrightness { display: DisplayId, level: f64 },
    /// Resolved against a fresh mode enumeration
    SetMode {
        display: DisplayId,
        width: u32,
        height: u32,
        refresh: f64,
    },
}

impl FromStr for Command {
    type Err = EngineError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let display = |word: &str| {
            word.parse::<DisplayId>()
                .map_err(|_| EngineError::command(input, format!("'{word}' is not a display id")))
        };

        match words.as_slice() {
            ["refresh"] => Ok(Command::Refresh),
            ["power", id, state] => {
                let on = match *state {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(EngineError::command(
                            input,
                            format!("power state must be 'on' or 'off', got '{other}'"),
                        ))
                    }
                };
                Ok(Command::SetPower {
                    display: display(id)?,
                    on,
                })
            }
            ["brightness", id, level] => {
                let level = level
                    .parse::<f64>()
                    .ok()
                    .filter(|l| (0.0..=1.0).contains(l))
                    .ok_or_else(|| EngineError::command(input, "level must be between 0.0 and 1.0"))?;
                Ok(Command::SetBrightness {
                    display: display(id)?,
                    level,
                })
            }
            ["mode", id, mode] => {
                let (width, height, refresh) = parse_mode(mode)
                    .ok_or_else(|| EngineError::command(input, "mode must look like 1920x1080@60"))?;
                Ok(Command::SetMode {
                    display: display(id)?,
                    width,
                    height,
                    refresh,
                })
            }
            [] => Err(EngineError::command(input, "empty command")),
            [verb, ..] => Err(EngineError::command(input, format!("unknown command '{verb}'"))),
        }
    }
}

/// Parse `WIDTHxHEIGHT@RATE`
pub fn parse_mode(text: &str) -> Option<(u32, u32, f64)> {
    let (size, rate) = text.split_once('@')?;
    let (width, height) = size.split_once('x')?;
    Some((width.parse().ok()?, height.parse().ok()?, rate.parse().ok()?))
}

pub struct Controller {
    engine: DisplayEngine,
    overlays: OverlayManager,
    ddc_external_brightness: bool,
}

impl Controller {
    pub fn new(engine: DisplayEngine, overlays: OverlayManager, config: &Config) -> Self {
        Self {
            engine,
            overlays,
            ddc_external_brightness: config.ddc_external_brightness,
        }
    }

    /// Read-only access for queries
    pub fn engine(&self) -> &DisplayEngine {
        &self.engine
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn handle(&mut self, command: Command) -> Outcome {
        debug!(?command, "Handling command");
        match command {
            Command::Refresh => {
                self.engine.refresh();
                self.overlays.sync();
                Outcome::Applied
            }
            Command::SetPower { display, on } => self.engine.set_power(display, on),
            Command::SetBrightness { display, level } => self.set_brightness(display, level),
            Command::SetMode {
                display,
                width,
                height,
                refresh,
            } => {
                match self.engine.find_mode(display, width, height, refresh) {
                    Some(mode) => self.engine.set_mode(display, &mode),
                    None => {
                        let display_id = display;
                        warn!(
                            display_id,
                            width, height, refresh, "Requested mode not offered by display"
                        );
                        Outcome::Failed
                    }
                }
            }
        }
    }

    /// Hardware brightness for the built-in panel, DDC/CI or dimming for the rest
    ///
    /// Only displays in the current registry snapshot are touched. A
    /// successful DDC/CI write lifts any dimming left from an earlier fallback.
    fn set_brightness(&mut self, display: DisplayId, level: f64) -> Outcome {
        if self.engine.display(display).is_none() {
            let err = EngineError::DisplayNotFound(display);
            warn!("{}, ignoring brightness request", err);
            return Outcome::Failed;
        }

        let level = level.clamp(0.0, 1.0);
        if self.engine.is_builtin(display) {
            return self.engine.set_brightness(display, level as f32);
        }

        if self.ddc_external_brightness {
            if self.engine.set_external_brightness(display, level as f32) == Outcome::Applied {
                if self.overlays.dimming_level(display) > 0.0 {
                    self.overlays.set_dimming(display, 1.0);
                    self.engine.notifier().notify(ChangeReason::Dimming);
                }
                return Outcome::Applied;
            }
            let display_id = display;
            info!(display_id, "DDC/CI brightness failed, using software dimming");
        }

        self.overlays.set_dimming(display, level);
        self.engine.notifier().notify(ChangeReason::Dimming);
        Outcome::Applied
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("engine", &self.engine)
            .field("overlays", &self.overlays)
            .field("ddc_external_brightness", &self.ddc_external_brightness)
            .finish()
    }
}
