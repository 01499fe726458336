// SPDX-License-Identifier: GPL-3.0-only
//! State-change notifications for the presentation layer
//!
//! The engine does not push data to observers. It bumps a generation counter
//! after every refresh or mutation; observers wake up and re-read the
//! snapshots they care about.

use std::sync::Arc;

use tokio::sync::watch;

/// What caused the most recent state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Initial,
    Refreshed,
    Power,
    Brightness,
    Mode,
    Dimming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub generation: u64,
    pub reason: ChangeReason,
}

/// Sending half of the notification channel, cheap to clone
#[derive(Clone)]
pub struct Notifier {
    tx: Arc<watch::Sender<StateChange>>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StateChange {
            generation: 0,
            reason: ChangeReason::Initial,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to future changes; the current value counts as already seen
    pub fn subscribe(&self) -> watch::Receiver<StateChange> {
        let mut rx = self.tx.subscribe();
        rx.mark_unchanged();
        rx
    }

    pub fn notify(&self, reason: ChangeReason) {
        self.tx.send_modify(|state| {
            state.generation += 1;
            state.reason = reason;
        });
    }

    pub fn current(&self) -> StateChange {
        *self.tx.borrow()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("current", &self.current())
            .finish()
    }
}
