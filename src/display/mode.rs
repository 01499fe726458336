// SPDX-License-Identifier: GPL-3.0-only
//! Display modes and their normalisation
//!
//! The OS reports many mode handles that look identical to a user (pixel
//! format and flag variants). Two modes are the same when width and height
//! match and the refresh rates differ by less than [`REFRESH_TOLERANCE_HZ`].

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Refresh rates closer than this are considered the same mode
pub const REFRESH_TOLERANCE_HZ: f64 = 0.1;

/// Opaque backend handle for a mode, only meaningful to the system that produced it
#[derive(Clone)]
pub struct ModeHandle(Arc<dyn Any + Send + Sync>);

impl ModeHandle {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    /// Access the backend value if it has the expected type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ModeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModeHandle(..)")
    }
}

/// A mode exactly as the OS reports it
#[derive(Debug, Clone)]
pub struct RawMode {
    pub width: u32,
    pub height: u32,
    /// 0.0 when the connection does not expose timing
    pub refresh_rate: f64,
    pub handle: ModeHandle,
}

/// A user-visible display mode
#[derive(Debug, Clone, Serialize)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: f64,
    #[serde(skip)]
    pub handle: ModeHandle,
}

impl DisplayMode {
    /// Build a mode from a raw OS mode, substituting `fallback_rate` for a zero rate
    pub fn from_raw(raw: RawMode, fallback_rate: f64) -> Self {
        let refresh_rate = if raw.refresh_rate > 0.0 {
            raw.refresh_rate
        } else {
            fallback_rate
        };
        Self {
            width: raw.width,
            height: raw.height,
            refresh_rate,
            handle: raw.handle,
        }
    }

    /// Whether this mode has the given visible characteristics
    pub fn matches(&self, width: u32, height: u32, refresh_rate: f64) -> bool {
        self.width == width
            && self.height == height
            && (self.refresh_rate - refresh_rate).abs() < REFRESH_TOLERANCE_HZ
    }

    /// Descending by width, then height, then refresh rate
    fn fidelity_order(a: &Self, b: &Self) -> Ordering {
        b.width
            .cmp(&a.width)
            .then(b.height.cmp(&a.height))
            .then(b.refresh_rate.total_cmp(&a.refresh_rate))
    }
}

impl PartialEq for DisplayMode {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.width, other.height, other.refresh_rate)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {}Hz",
            self.width,
            self.height,
            self.refresh_rate.round() as i64
        )
    }
}

/// Turn raw OS modes into a deduplicated list, highest fidelity first
///
/// Sorting happens before deduplication so each group of equal modes keeps
/// its highest refresh rate. Within a width/height group rates are
/// descending, so comparing against the last kept mode is enough.
pub fn normalize_modes(raw: Vec<RawMode>, fallback_rate: f64) -> Vec<DisplayMode> {
    let mut modes: Vec<DisplayMode> = raw
        .into_iter()
        .map(|m| DisplayMode::from_raw(m, fallback_rate))
        .collect();
    modes.sort_by(DisplayMode::fidelity_order);

    let mut unique: Vec<DisplayMode> = Vec::with_capacity(modes.len());
    for mode in modes {
        if unique.last().is_some_and(|kept| *kept == mode) {
            continue;
        }
        unique.push(mode);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(width: u32, height: u32, refresh_rate: f64) -> RawMode {
        RawMode {
            width,
            height,
            refresh_rate,
            handle: ModeHandle::new((width, height)),
        }
    }

    fn shape(modes: &[DisplayMode]) -> Vec<(u32, u32, f64)> {
        modes
            .iter()
            .map(|m| (m.width, m.height, m.refresh_rate))
            .collect()
    }

    #[test]
    fn test_close_refresh_rates_collapse() {
        let modes = normalize_modes(vec![raw(1920, 1080, 59.94), raw(1920, 1080, 60.0)], 60.0);
        assert_eq!(modes.len(), 1);
        // Highest rate of the group survives
        assert_eq!(modes[0].refresh_rate, 60.0);
    }

    #[test]
    fn test_distinct_resolutions_kept() {
        let modes = normalize_modes(vec![raw(1920, 1080, 60.0), raw(2560, 1440, 60.0)], 60.0);
        assert_eq!(modes.len(), 2);
    }

    #[test]
    fn test_order_width_height_rate_descending() {
        let modes = normalize_modes(
            vec![
                raw(1920, 1080, 60.0),
                raw(2560, 1440, 60.0),
                raw(1920, 1080, 144.0),
            ],
            60.0,
        );
        assert_eq!(
            shape(&modes),
            vec![(2560, 1440, 60.0), (1920, 1080, 144.0), (1920, 1080, 60.0)]
        );
    }

    #[test]
    fn test_height_breaks_width_ties() {
        let modes = normalize_modes(vec![raw(1920, 1080, 60.0), raw(1920, 1200, 60.0)], 60.0);
        assert_eq!(shape(&modes), vec![(1920, 1200, 60.0), (1920, 1080, 60.0)]);
    }

    #[test]
    fn test_zero_rate_uses_fallback() {
        let modes = normalize_modes(vec![raw(1440, 900, 0.0)], 60.0);
        assert_eq!(modes[0].refresh_rate, 60.0);

        // A zero rate and a real 60 Hz variant are the same mode
        let modes = normalize_modes(vec![raw(1440, 900, 0.0), raw(1440, 900, 60.0)], 60.0);
        assert_eq!(modes.len(), 1);
    }

    #[test]
    fn test_pixel_format_variants_deduplicated() {
        let modes = normalize_modes(
            vec![
                raw(2560, 1440, 59.95),
                raw(2560, 1440, 59.95),
                raw(2560, 1440, 59.95),
                raw(2560, 1440, 30.0),
            ],
            60.0,
        );
        assert_eq!(shape(&modes), vec![(2560, 1440, 59.95), (2560, 1440, 30.0)]);
    }

    #[test]
    fn test_no_two_equal_modes_survive() {
        let modes = normalize_modes(
            vec![
                raw(1920, 1080, 60.05),
                raw(1920, 1080, 59.99),
                raw(1920, 1080, 59.93),
                raw(1920, 1080, 50.0),
                raw(1280, 720, 60.0),
            ],
            60.0,
        );
        for (i, a) in modes.iter().enumerate() {
            for b in &modes[i + 1..] {
                assert!(a != b, "{a} and {b} should not both survive");
            }
        }
    }

    #[test]
    fn test_handle_survives_normalisation() {
        let modes = normalize_modes(vec![raw(800, 600, 75.0)], 60.0);
        assert_eq!(modes[0].handle.downcast_ref::<(u32, u32)>(), Some(&(800, 600)));
        assert!(modes[0].handle.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_display_label() {
        let mode = DisplayMode::from_raw(raw(2560, 1440, 59.94), 60.0);
        assert_eq!(mode.to_string(), "2560x1440 @ 60Hz");
    }
}
