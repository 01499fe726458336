// SPDX-License-Identifier: GPL-3.0-only
//! AppKit dimming overlay windows
//!
//! Everything here must run on the main thread, which the
//! [`MainThreadMarker`] arguments enforce.

use objc2::rc::Retained;
use objc2::MainThreadMarker;
use objc2_app_kit::{
    NSBackingStoreType, NSColor, NSScreen, NSWindow, NSWindowCollectionBehavior,
    NSWindowStyleMask,
};
use objc2_foundation::{NSNumber, NSPoint, NSRect, NSSize, NSString};

use crate::display::DisplayId;
use crate::overlay::{Frame, OverlayHost, OverlaySurface, ScreenFrame};

/// `NSFloatingWindowLevel`
const FLOATING_WINDOW_LEVEL: isize = 3;

fn screen_display_id(screen: &NSScreen) -> Option<DisplayId> {
    let description = screen.deviceDescription();
    let key = NSString::from_str("NSScreenNumber");
    let number = description.objectForKey(&key)?.downcast::<NSNumber>().ok()?;
    Some(number.unsignedIntValue())
}

/// The window system's name for a display
pub fn screen_name(mtm: MainThreadMarker, display: DisplayId) -> Option<String> {
    NSScreen::screens(mtm)
        .iter()
        .find(|screen| screen_display_id(screen) == Some(display))
        .map(|screen| screen.localizedName().to_string())
}

fn to_rect(frame: Frame) -> NSRect {
    NSRect::new(
        NSPoint::new(frame.x, frame.y),
        NSSize::new(frame.width, frame.height),
    )
}

fn from_rect(rect: NSRect) -> Frame {
    Frame {
        x: rect.origin.x,
        y: rect.origin.y,
        width: rect.size.width,
        height: rect.size.height,
    }
}

/// Creates overlay windows on the screens AppKit knows about
pub struct AppKitHost {
    mtm: MainThreadMarker,
}

impl AppKitHost {
    pub fn new(mtm: MainThreadMarker) -> Self {
        Self { mtm }
    }
}

impl OverlayHost for AppKitHost {
    fn screens(&self) -> Vec<ScreenFrame> {
        NSScreen::screens(self.mtm)
            .iter()
            .filter_map(|screen| {
                Some(ScreenFrame {
                    display: screen_display_id(&screen)?,
                    frame: from_rect(screen.frame()),
                })
            })
            .collect()
    }

    fn create_surface(
        &mut self,
        display: DisplayId,
        frame: Frame,
    ) -> Option<Box<dyn OverlaySurface>> {
        let rect = to_rect(frame);
        // SAFETY: plain window creation on the main thread.
        let window = unsafe {
            NSWindow::initWithContentRect_styleMask_backing_defer(
                self.mtm.alloc::<NSWindow>(),
                rect,
                NSWindowStyleMask::Borderless,
                NSBackingStoreType::Buffered,
                false,
            )
        };
        // The overlay is owned here, AppKit must not free it on close
        unsafe { window.setReleasedWhenClosed(false) };
        window.setOpaque(false);
        window.setBackgroundColor(Some(&NSColor::blackColor()));
        window.setAlphaValue(0.0);
        window.setLevel(FLOATING_WINDOW_LEVEL);
        window.setIgnoresMouseEvents(true);
        window.setCollectionBehavior(
            NSWindowCollectionBehavior::CanJoinAllSpaces
                | NSWindowCollectionBehavior::Stationary
                | NSWindowCollectionBehavior::IgnoresCycle,
        );
        window.setFrame_display(rect, true);

        let display_id = display;
        debug!(display_id, ?frame, "Created overlay window");
        Some(Box::new(OverlayWindow { window }))
    }
}

struct OverlayWindow {
    window: Retained<NSWindow>,
}

impl OverlaySurface for OverlayWindow {
    fn set_frame(&mut self, frame: Frame) {
        self.window.setFrame_display(to_rect(frame), true);
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.window.setAlphaValue(opacity);
    }

    fn show(&mut self) {
        self.window.orderFront(None);
    }

    fn hide(&mut self) {
        self.window.orderOut(None);
    }
}
