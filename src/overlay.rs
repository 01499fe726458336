// SPDX-License-Identifier: GPL-3.0-only
//! Software dimming fallback
//!
//! Displays without a hardware brightness path are dimmed by a black,
//! click-through surface covering the whole screen. Its opacity is the
//! inverse of the requested brightness, capped below fully opaque.
//!
//! Surfaces are owned here, one per display. When a display disappears its
//! surface is hidden, not destroyed, and it is reused if the same display
//! comes back.

use std::collections::HashMap;

use crate::display::DisplayId;

/// Upper bound for overlay opacity; the screen always stays readable
pub const MAX_DIMMING: f64 = 0.95;

/// Overlay opacity for a requested perceived brightness
///
/// # Arguments
///
/// * `brightness` - Desired brightness, clamped to 0.0-1.0
/// * `max_dimming` - Opacity at zero brightness, clamped to 0.0-[`MAX_DIMMING`]
pub fn dimming_for(brightness: f64, max_dimming: f64) -> f64 {
    (1.0 - brightness.clamp(0.0, 1.0)) * max_dimming.clamp(0.0, MAX_DIMMING)
}

/// Screen rectangle in window-system coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A screen currently known to the window system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenFrame {
    pub display: DisplayId,
    pub frame: Frame,
}

/// One overlay window
pub trait OverlaySurface {
    fn set_frame(&mut self, frame: Frame);

    /// 0.0 is fully transparent
    fn set_opacity(&mut self, opacity: f64);

    /// Order the surface to the front
    fn show(&mut self);

    fn hide(&mut self);
}

/// Window system the overlays live in
pub trait OverlayHost {
    /// Screens the window system currently shows
    fn screens(&self) -> Vec<ScreenFrame>;

    /// Create a borderless, click-through, always-on-top, transparent surface
    fn create_surface(&mut self, display: DisplayId, frame: Frame)
        -> Option<Box<dyn OverlaySurface>>;
}

struct Overlay {
    surface: Box<dyn OverlaySurface>,
    attached: bool,
}

pub struct OverlayManager {
    host: Box<dyn OverlayHost>,
    max_dimming: f64,
    overlays: HashMap<DisplayId, Overlay>,
    levels: HashMap<DisplayId, f64>,
}

impl OverlayManager {
    pub fn new(host: Box<dyn OverlayHost>, max_dimming: f64) -> Self {
        Self {
            host,
            max_dimming: max_dimming.clamp(0.0, MAX_DIMMING),
            overlays: HashMap::new(),
            levels: HashMap::new(),
        }
    }

    pub fn max_dimming(&self) -> f64 {
        self.max_dimming
    }

    /// Bring the overlays in line with the screens the window system shows
    ///
    /// Overlays of vanished screens are hidden and kept. Every present screen
    /// gets an overlay covering its frame, created on first sight, and
    /// carrying its current dimming level.
    pub fn sync(&mut self) {
        let screens = self.host.screens();

        for (id, overlay) in self.overlays.iter_mut() {
            if overlay.attached && !screens.iter().any(|s| s.display == *id) {
                debug!(display_id = *id, "Screen gone, hiding dimming overlay");
                overlay.surface.hide();
                overlay.attached = false;
            }
        }

        for screen in screens {
            let opacity = self.dimming_level(screen.display);
            if !self.overlays.contains_key(&screen.display) {
                let Some(surface) = self.host.create_surface(screen.display, screen.frame) else {
                    warn!(display_id = screen.display, "Could not create dimming overlay");
                    continue;
                };
                debug!(display_id = screen.display, "Created dimming overlay");
                self.overlays.insert(
                    screen.display,
                    Overlay {
                        surface,
                        attached: false,
                    },
                );
            }
            let Some(overlay) = self.overlays.get_mut(&screen.display) else {
                continue;
            };

            overlay.surface.set_frame(screen.frame);
            overlay.surface.show();
            overlay.surface.set_opacity(opacity);
            overlay.attached = true;
        }
    }

    /// Dim a display to the given perceived brightness
    ///
    /// The level is remembered even when the display has no overlay yet and
    /// is applied on the next [`sync`](Self::sync).
    pub fn set_dimming(&mut self, display: DisplayId, brightness: f64) {
        let opacity = dimming_for(brightness, self.max_dimming);
        let display_id = display;
        debug!(display_id, brightness, opacity, "Set software dimming");
        self.levels.insert(display, opacity);
        if let Some(overlay) = self.overlays.get_mut(&display) {
            overlay.surface.set_opacity(opacity);
        }
    }

    /// Current overlay opacity, 0.0 when the display was never dimmed
    pub fn dimming_level(&self, display: DisplayId) -> f64 {
        self.levels.get(&display).copied().unwrap_or(0.0)
    }

    /// Displays whose overlay is currently on screen
    pub fn attached(&self) -> Vec<DisplayId> {
        let mut ids: Vec<_> = self
            .overlays
            .iter()
            .filter(|(_, overlay)| overlay.attached)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayManager")
            .field("max_dimming", &self.max_dimming)
            .field("attached", &self.attached())
            .field("levels", &self.levels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHost;

    fn frame(x: f64) -> Frame {
        Frame {
            x,
            y: 0.0,
            width: 1920.0,
            height: 1080.0,
        }
    }

    #[test]
    fn test_dimming_formula() {
        assert_eq!(dimming_for(1.0, MAX_DIMMING), 0.0);
        assert!((dimming_for(0.0, MAX_DIMMING) - 0.95).abs() < 1e-9);
        assert!((dimming_for(0.5, MAX_DIMMING) - 0.475).abs() < 1e-9);
    }

    #[test]
    fn test_dimming_monotonic_decreasing() {
        let levels: Vec<f64> = (0..=20)
            .map(|step| dimming_for(step as f64 / 20.0, MAX_DIMMING))
            .collect();
        assert!(levels.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn test_dimming_never_fully_opaque() {
        assert!(dimming_for(-3.0, 1.0) <= MAX_DIMMING);
        assert_eq!(dimming_for(2.0, MAX_DIMMING), 0.0);
    }

    #[test]
    fn test_sync_creates_covering_overlays() {
        let host = RecordingHost::new(vec![(1, frame(0.0)), (2, frame(1920.0))]);
        let state = host.state();
        let mut manager = OverlayManager::new(Box::new(host), MAX_DIMMING);

        manager.sync();
        assert_eq!(manager.attached(), vec![1, 2]);
        let state = state.borrow();
        let second = &state.surfaces[&2];
        assert_eq!(second.frame, frame(1920.0));
        assert!(second.visible);
        assert_eq!(second.opacity, 0.0);
    }

    #[test]
    fn test_set_dimming_updates_overlay() {
        let host = RecordingHost::new(vec![(1, frame(0.0))]);
        let state = host.state();
        let mut manager = OverlayManager::new(Box::new(host), MAX_DIMMING);
        manager.sync();

        manager.set_dimming(1, 0.0);
        assert!((state.borrow().surfaces[&1].opacity - 0.95).abs() < 1e-9);
        manager.set_dimming(1, 1.0);
        assert_eq!(state.borrow().surfaces[&1].opacity, 0.0);
    }

    #[test]
    fn test_level_applied_on_later_sync() {
        let host = RecordingHost::new(vec![(3, frame(0.0))]);
        let state = host.state();
        let mut manager = OverlayManager::new(Box::new(host), MAX_DIMMING);

        manager.set_dimming(3, 0.5);
        assert!(state.borrow().surfaces.is_empty());
        manager.sync();
        assert!((state.borrow().surfaces[&3].opacity - 0.475).abs() < 1e-9);
    }

    #[test]
    fn test_vanished_screen_hidden_then_reclaimed() {
        let host = RecordingHost::new(vec![(1, frame(0.0)), (2, frame(1920.0))]);
        let state = host.state();
        let mut manager = OverlayManager::new(Box::new(host), MAX_DIMMING);
        manager.sync();
        manager.set_dimming(2, 0.0);

        state.borrow_mut().screens.retain(|s| s.display != 2);
        manager.sync();
        assert_eq!(manager.attached(), vec![1]);
        assert!(!state.borrow().surfaces[&2].visible);

        // Same display returns at a new position
        state.borrow_mut().screens.push(ScreenFrame {
            display: 2,
            frame: frame(-1920.0),
        });
        manager.sync();
        let state = state.borrow();
        let surface = &state.surfaces[&2];
        assert!(surface.visible);
        assert_eq!(surface.frame, frame(-1920.0));
        assert!((surface.opacity - 0.95).abs() < 1e-9);
        assert_eq!(state.created, 2);
    }

    #[test]
    fn test_surface_creation_failure_is_skipped() {
        let host = RecordingHost::new(vec![(1, frame(0.0))]);
        let state = host.state();
        state.borrow_mut().fail_create = true;
        let mut manager = OverlayManager::new(Box::new(host), MAX_DIMMING);

        manager.sync();
        assert!(manager.attached().is_empty());

        state.borrow_mut().fail_create = false;
        manager.sync();
        assert_eq!(manager.attached(), vec![1]);
    }

    #[test]
    fn test_configured_max_dimming() {
        let host = RecordingHost::new(vec![(1, frame(0.0))]);
        let state = host.state();
        let mut manager = OverlayManager::new(Box::new(host), 0.5);
        manager.sync();

        manager.set_dimming(1, 0.0);
        assert_eq!(state.borrow().surfaces[&1].opacity, 0.5);

        let capped = OverlayManager::new(Box::new(RecordingHost::new(vec![])), 3.0);
        assert_eq!(capped.max_dimming(), MAX_DIMMING);
    }
}
