// SPDX-License-Identifier: GPL-3.0-only
//! The CoreGraphics display subsystem

use std::marker::PhantomData;

use objc2::MainThreadMarker;
use objc2_core_foundation::{CFArray, CFRetained};
use objc2_core_graphics::{
    CGBeginDisplayConfiguration, CGCancelDisplayConfiguration, CGCompleteDisplayConfiguration,
    CGConfigureDisplayWithDisplayMode, CGConfigureOption, CGDisplayConfigRef,
    CGDisplayCopyAllDisplayModes, CGDisplayCopyDisplayMode, CGDisplayIsActive, CGDisplayIsBuiltin,
    CGDisplayIsOnline, CGDisplayMode, CGDisplayModeGetHeight, CGDisplayModeGetRefreshRate,
    CGDisplayModeGetWidth, CGDisplayModelNumber, CGDisplayVendorNumber, CGError,
    CGGetOnlineDisplayList,
};

use crate::display::{DisplayId, DisplayTarget, ModeHandle, RawMode};
use crate::system::{ConfigTransaction, DisplaySystem, RawConfigRef};

use super::{iokit, overlay};

/// A retained `CGDisplayMode`
struct CgMode(CFRetained<CGDisplayMode>);

// SAFETY: CGDisplayMode is an immutable CoreFoundation type.
unsafe impl Send for CgMode {}
unsafe impl Sync for CgMode {}

impl CgMode {
    fn into_raw_mode(self) -> RawMode {
        let mode = Some(&*self.0);
        RawMode {
            width: CGDisplayModeGetWidth(mode) as u32,
            height: CGDisplayModeGetHeight(mode) as u32,
            refresh_rate: CGDisplayModeGetRefreshRate(mode),
            handle: ModeHandle::new(self),
        }
    }
}

#[derive(Debug, Default)]
pub struct CoreGraphicsSystem;

impl CoreGraphicsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl DisplaySystem for CoreGraphicsSystem {
    fn online_displays(&self, capacity: usize) -> Option<Vec<DisplayId>> {
        let mut ids = vec![0u32; capacity];
        let mut count = 0u32;
        // SAFETY: buffer holds `capacity` ids.
        let status =
            unsafe { CGGetOnlineDisplayList(capacity as u32, ids.as_mut_ptr(), &mut count) };
        if status != CGError::Success {
            return None;
        }
        ids.truncate(count as usize);
        Some(ids)
    }

    fn is_online(&self, display: DisplayId) -> bool {
        CGDisplayIsOnline(display)
    }

    fn is_active(&self, display: DisplayId) -> bool {
        CGDisplayIsActive(display)
    }

    fn is_builtin(&self, display: DisplayId) -> bool {
        CGDisplayIsBuiltin(display)
    }

    fn target(&self, display: DisplayId) -> DisplayTarget {
        // Unknown ids yield 0
        DisplayTarget {
            id: display,
            vendor: CGDisplayVendorNumber(display),
            product: CGDisplayModelNumber(display),
        }
    }

    fn localized_name(&self, display: DisplayId) -> Option<String> {
        // Screen names come from AppKit, which is main thread only
        let mtm = MainThreadMarker::new()?;
        overlay::screen_name(mtm, display)
    }

    fn begin_configuration(&self) -> Option<Box<dyn ConfigTransaction + '_>> {
        let mut config: CGDisplayConfigRef = std::ptr::null_mut();
        // SAFETY: valid out pointer.
        let status = unsafe { CGBeginDisplayConfiguration(&mut config) };
        if status != CGError::Success || config.is_null() {
            warn!(status = status.0, "CGBeginDisplayConfiguration failed");
            return None;
        }
        Some(Box::new(CgTransaction {
            config,
            finished: false,
            _system: PhantomData,
        }))
    }

    fn all_modes(&self, display: DisplayId) -> Vec<RawMode> {
        let Some(modes) = CGDisplayCopyAllDisplayModes(display, None) else {
            return Vec::new();
        };
        // SAFETY: the array only ever holds CGDisplayMode values.
        let modes: &CFArray<CGDisplayMode> = unsafe { modes.cast_unchecked() };
        (0..modes.len())
            .filter_map(|index| modes.get(index))
            .map(|mode| CgMode(mode).into_raw_mode())
            .collect()
    }

    fn current_mode(&self, display: DisplayId) -> Option<RawMode> {
        CGDisplayCopyDisplayMode(display).map(|mode| CgMode(mode).into_raw_mode())
    }

    fn float_parameter(&self, display: DisplayId, key: &str) -> Option<f32> {
        iokit::find_display_service(&self.target(display))?.float_parameter(key)
    }

    fn set_float_parameter(&self, display: DisplayId, key: &str, value: f32) -> bool {
        iokit::find_display_service(&self.target(display))
            .is_some_and(|service| service.set_float_parameter(key, value))
    }
}

/// An open `CGDisplayConfigRef`, cancelled unless completed
struct CgTransaction<'a> {
    config: CGDisplayConfigRef,
    finished: bool,
    _system: PhantomData<&'a CoreGraphicsSystem>,
}

impl ConfigTransaction for CgTransaction<'_> {
    fn raw(&self) -> RawConfigRef {
        RawConfigRef(self.config.cast())
    }

    fn configure_mode(&mut self, display: DisplayId, mode: &ModeHandle) -> bool {
        let Some(mode) = mode.downcast_ref::<CgMode>() else {
            let display_id = display;
            warn!(display_id, "Mode handle was not produced by CoreGraphics");
            return false;
        };
        // SAFETY: open transaction and live mode.
        let status = unsafe {
            CGConfigureDisplayWithDisplayMode(self.config, display, Some(&mode.0), None)
        };
        status == CGError::Success
    }

    fn commit(mut self: Box<Self>) -> bool {
        self.finished = true;
        // SAFETY: open transaction, completed once.
        let status =
            unsafe { CGCompleteDisplayConfiguration(self.config, CGConfigureOption::Permanently) };
        if status != CGError::Success {
            warn!(status = status.0, "CGCompleteDisplayConfiguration failed");
        }
        status == CGError::Success
    }

    fn cancel(mut self: Box<Self>) {
        self.finished = true;
        // SAFETY: open transaction, cancelled once.
        unsafe {
            CGCancelDisplayConfiguration(self.config);
        }
    }
}

impl Drop for CgTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // SAFETY: still open, neither completed nor cancelled.
            unsafe {
                CGCancelDisplayConfiguration(self.config);
            }
        }
    }
}
