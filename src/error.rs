// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the engine
//!
//! Hardware outcomes are never errors: display operations report an
//! [`Outcome`](crate::backend::Outcome) instead. The variants here cover the
//! parts of the process that can genuinely fail to start or parse.

use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration file could not be parsed
    #[error("Configuration error in {path}: {reason}")]
    Config { path: String, reason: String },

    /// A textual command could not be understood
    #[error("Invalid command '{input}': {reason}")]
    Command { input: String, reason: String },

    /// The platform display subsystem could not be initialized
    #[error("Platform initialization failed: {0}")]
    Platform(String),

    /// Display not present in the current registry snapshot
    #[error("Display {0} not found")]
    DisplayNotFound(u32),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn command(input: &str, reason: impl Into<String>) -> Self {
        Self::Command {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
