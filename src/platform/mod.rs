// SPDX-License-Identifier: GPL-3.0-only
//! Platform backends
//!
//! Only macOS has a real implementation. Elsewhere the entry points report
//! [`EngineError::Platform`] so the library still builds and tests run.

#[cfg(target_os = "macos")]
pub mod macos;

use crate::config::Config;
use crate::engine::DisplayEngine;
#[cfg(not(target_os = "macos"))]
use crate::error::EngineError;
use crate::error::Result;

/// Engine for the displays of this machine
pub fn open_engine(config: &Config) -> Result<DisplayEngine> {
    #[cfg(target_os = "macos")]
    {
        Ok(macos::open_engine(config))
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = config;
        Err(EngineError::Platform(format!(
            "display control is not supported on {}",
            std::env::consts::OS
        )))
    }
}

/// Run the display daemon on the current (main) thread
pub fn run_daemon(config: &Config) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        macos::run_daemon(config)
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = config;
        Err(EngineError::Platform(format!(
            "the display daemon is not supported on {}",
            std::env::consts::OS
        ))
        .into())
    }
}

#[cfg(all(test, not(target_os = "macos")))]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_platform_reports_error() {
        let err = open_engine(&Config::default()).unwrap_err();
        assert!(matches!(err, EngineError::Platform(_)));
        assert!(run_daemon(&Config::default()).is_err());
    }
}
