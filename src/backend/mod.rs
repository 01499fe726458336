// SPDX-License-Identifier: GPL-3.0-only
//! Backend strategies and ordered fallback chains
//!
//! Each logical operation (power, brightness, DDC write, mode) owns a
//! [`Chain`] of strategy objects. The chain tries them in order and stops at
//! the first success. Changing priorities means changing the list, nothing
//! else.

pub mod brightness;
pub mod mode;
pub mod power;

use std::fmt;

use serde::Serialize;

use crate::display::DisplayId;

pub use brightness::{BrightnessBackend, ParameterBrightness, PrivateBrightness};
pub use mode::{ModeBackend, TransactionMode};
pub use power::{PowerBackend, PrivateEnablePower};

/// Why a single backend did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend's capability does not exist on this system
    Unavailable,
    /// The backend exists but the attempt failed
    Failed(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unavailable => f.write_str("unavailable"),
            BackendError::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Result of a best-effort display operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// A backend applied the change
    Applied,
    /// The request would break a safety invariant and was not attempted
    Refused,
    /// No backend exists for this operation on this system
    Unavailable,
    /// At least one backend exists but none succeeded
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Applied => "applied",
            Outcome::Refused => "refused",
            Outcome::Unavailable => "unavailable",
            Outcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Common surface of every backend strategy
pub trait Backend {
    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// What walking a chain produced
#[derive(Debug, PartialEq)]
pub enum Attempt<T> {
    Success { backend: &'static str, value: T },
    Exhausted { any_failed: bool },
}

impl<T> Attempt<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Attempt::Success { value, .. } => Some(value),
            Attempt::Exhausted { .. } => None,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Attempt::Success { .. } => Outcome::Applied,
            Attempt::Exhausted { any_failed: true } => Outcome::Failed,
            Attempt::Exhausted { any_failed: false } => Outcome::Unavailable,
        }
    }
}

/// Ordered list of backends for one operation
pub struct Chain<B: ?Sized> {
    operation: &'static str,
    backends: Vec<Box<B>>,
}

impl<B: ?Sized + Backend> Chain<B> {
    pub fn new(operation: &'static str, backends: Vec<Box<B>>) -> Self {
        Self {
            operation,
            backends,
        }
    }

    /// Insert a backend ahead of all others
    pub fn prepend(&mut self, backend: Box<B>) {
        self.backends.insert(0, backend);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Try each backend once, in order, until one succeeds
    pub fn attempt<T>(
        &self,
        display_id: DisplayId,
        mut op: impl FnMut(&B) -> Result<T, BackendError>,
    ) -> Attempt<T> {
        let mut any_failed = false;
        for backend in &self.backends {
            debug!(
                display_id,
                operation = self.operation,
                backend = backend.name(),
                "Attempting backend"
            );
            match op(backend.as_ref()) {
                Ok(value) => {
                    debug!(
                        display_id,
                        operation = self.operation,
                        backend = backend.name(),
                        "Backend succeeded"
                    );
                    return Attempt::Success {
                        backend: backend.name(),
                        value,
                    };
                }
                Err(BackendError::Unavailable) => {
                    debug!(
                        display_id,
                        operation = self.operation,
                        backend = backend.name(),
                        "Backend unavailable, falling through"
                    );
                }
                Err(BackendError::Failed(reason)) => {
                    any_failed = true;
                    warn!(
                        display_id,
                        operation = self.operation,
                        backend = backend.name(),
                        %reason,
                        "Backend failed"
                    );
                }
            }
        }
        Attempt::Exhausted { any_failed }
    }
}

impl<B: ?Sized + Backend> fmt::Debug for Chain<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("operation", &self.operation)
            .field("backends", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Scripted {
        name: &'static str,
        result: Result<u8, BackendError>,
        calls: RefCell<u32>,
    }

    impl Backend for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn scripted(name: &'static str, result: Result<u8, BackendError>) -> Box<Scripted> {
        Box::new(Scripted {
            name,
            result,
            calls: RefCell::new(0),
        })
    }

    fn run(chain: &Chain<Scripted>) -> Attempt<u8> {
        chain.attempt(1, |b| {
            *b.calls.borrow_mut() += 1;
            b.result.clone()
        })
    }

    #[test]
    fn test_first_success_wins() {
        let chain = Chain::new(
            "test",
            vec![scripted("a", Ok(1)), scripted("b", Ok(2))],
        );
        assert_eq!(run(&chain), Attempt::Success { backend: "a", value: 1 });
        assert_eq!(*chain.backends[1].calls.borrow(), 0);
    }

    #[test]
    fn test_unavailable_falls_through() {
        let chain = Chain::new(
            "test",
            vec![scripted("a", Err(BackendError::Unavailable)), scripted("b", Ok(2))],
        );
        assert_eq!(run(&chain), Attempt::Success { backend: "b", value: 2 });
    }

    #[test]
    fn test_failure_falls_through_once() {
        let chain = Chain::new(
            "test",
            vec![
                scripted("a", Err(BackendError::Failed("bus error".into()))),
                scripted("b", Ok(2)),
            ],
        );
        assert_eq!(run(&chain).value(), Some(2));
        // Single attempt per backend, no retries
        assert_eq!(*chain.backends[0].calls.borrow(), 1);
    }

    #[test]
    fn test_exhausted_outcomes() {
        let chain = Chain::new("test", vec![scripted("a", Err(BackendError::Unavailable))]);
        assert_eq!(run(&chain).outcome(), Outcome::Unavailable);

        let chain = Chain::new(
            "test",
            vec![
                scripted("a", Err(BackendError::Unavailable)),
                scripted("b", Err(BackendError::Failed("nak".into()))),
            ],
        );
        assert_eq!(run(&chain).outcome(), Outcome::Failed);

        let empty: Chain<Scripted> = Chain::new("test", Vec::new());
        assert_eq!(run(&empty).outcome(), Outcome::Unavailable);
    }

    #[test]
    fn test_prepend_changes_priority() {
        let mut chain = Chain::new("test", vec![scripted("b", Ok(2))]);
        chain.prepend(scripted("a", Ok(1)));
        assert_eq!(chain.names(), vec!["a", "b"]);
        assert_eq!(run(&chain).value(), Some(1));
    }
}
