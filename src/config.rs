// SPDX-License-Identifier: GPL-3.0-only
//! Engine configuration
//!
//! Read once at startup from a KDL file and never written back:
//!
//! ```kdl
//! log-filter "warn,hikari=debug"
//! max-dimming 0.8
//! fallback-refresh-rate 60.0
//! display-list-capacity 16
//! ddc-external-brightness #true
//! ```

use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlNode, KdlValue};

use crate::error::{EngineError, Result};
use crate::overlay::MAX_DIMMING;

pub const APP_DIR: &str = "hikari";
pub const CONFIG_FILE: &str = "config.kdl";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Default tracing filter when `RUST_LOG` is not set
    pub log_filter: String,
    /// Overlay opacity at zero brightness
    pub max_dimming: f64,
    /// Refresh rate used when the OS reports 0 Hz
    pub fallback_refresh_rate: f64,
    /// Maximum number of displays enumerated
    pub display_list_capacity: usize,
    /// Drive external display brightness over DDC/CI before falling back to dimming
    pub ddc_external_brightness: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "warn,hikari=info".to_string(),
            max_dimming: MAX_DIMMING,
            fallback_refresh_rate: 60.0,
            display_list_capacity: 16,
            ddc_external_brightness: false,
        }
    }
}

impl Config {
    /// `~/.config/hikari/config.kdl` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration, never failing
    ///
    /// A missing file gives defaults. An unreadable or malformed file is
    /// logged and also gives defaults, so the engine always starts.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            debug!("No configuration directory, using defaults");
            return Self::default();
        };

        match Self::read(&path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Ok(None) => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Self::default()
            }
            Err(e) => {
                error!("Failed to load configuration: {e}, using defaults");
                Self::default()
            }
        }
    }

    /// Read and parse a configuration file, `Ok(None)` if it does not exist
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text, &path.display().to_string()).map(Some)
    }

    /// Parse configuration text
    ///
    /// # Arguments
    ///
    /// * `text` - KDL document
    /// * `origin` - Where the text came from, used in error messages
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let invalid = |reason: String| EngineError::Config {
            path: origin.to_string(),
            reason,
        };

        let doc: KdlDocument = text.parse().map_err(|e| invalid(format!("{e}")))?;
        let mut config = Self::default();

        for node in doc.nodes() {
            let key = node.name().value();
            let value = argument(node).ok_or_else(|| invalid(format!("'{key}' needs a value")))?;
            match key {
                "log-filter" => {
                    config.log_filter = value
                        .as_string()
                        .ok_or_else(|| invalid(format!("'{key}' must be a string")))?
                        .to_string();
                }
                "max-dimming" => {
                    let level = number(value)
                        .ok_or_else(|| invalid(format!("'{key}' must be a number")))?;
                    config.max_dimming = level.clamp(0.0, MAX_DIMMING);
                }
                "fallback-refresh-rate" => {
                    let rate = number(value)
                        .filter(|rate| *rate > 0.0)
                        .ok_or_else(|| invalid(format!("'{key}' must be a positive number")))?;
                    config.fallback_refresh_rate = rate;
                }
                "display-list-capacity" => {
                    let capacity = value
                        .as_integer()
                        .and_then(|n| usize::try_from(n).ok())
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid(format!("'{key}' must be a positive integer")))?;
                    config.display_list_capacity = capacity;
                }
                "ddc-external-brightness" => {
                    config.ddc_external_brightness = value
                        .as_bool()
                        .ok_or_else(|| invalid(format!("'{key}' must be #true or #false")))?;
                }
                other => warn!(key = other, "Ignoring unknown configuration key"),
            }
        }

        Ok(config)
    }
}

/// First positional argument of a node
fn argument(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|entry| entry.name().is_none())
        .map(|entry| entry.value())
}

fn number(value: &KdlValue) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|n| n as f64))
}
