// SPDX-License-Identifier: GPL-3.0-only
//! In-memory fakes of the OS surfaces, for unit tests
//!
//! Each fake keeps its state behind `Rc<RefCell<_>>` so a test can hand the
//! fake to the engine and still inspect or tweak what the "OS" sees.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::{Backend, BackendError};
use crate::capability::{
    BrightnessService, Capability, CapabilityProvider, DisplayEnabler, DisplayListing,
};
use crate::ddc::SetVcpFrame;
use crate::display::{DisplayId, DisplayTarget, ModeHandle, RawMode};
use crate::i2c::I2cTransport;
use crate::overlay::{Frame, OverlayHost, OverlaySurface, ScreenFrame};
use crate::system::{ConfigTransaction, DisplaySystem, RawConfigRef};

type Shape = (u32, u32, f64);

#[derive(Debug, Clone)]
pub struct FakeDisplay {
    pub id: DisplayId,
    pub builtin: bool,
    pub online: bool,
    pub active: bool,
    pub name: Option<String>,
    pub vendor: u32,
    pub product: u32,
    pub modes: Vec<Shape>,
    pub current_mode: Option<Shape>,
    pub brightness_parameter: Option<f32>,
}

impl FakeDisplay {
    pub fn builtin(id: DisplayId) -> Self {
        Self {
            id,
            builtin: true,
            online: true,
            active: true,
            name: Some("Color LCD".into()),
            vendor: 0x610,
            product: 0xa044,
            modes: vec![(1512, 982, 120.0)],
            current_mode: Some((1512, 982, 120.0)),
            brightness_parameter: None,
        }
    }

    pub fn external(id: DisplayId, name: &str) -> Self {
        Self {
            id,
            builtin: false,
            online: true,
            active: true,
            name: Some(name.into()),
            vendor: 0x10ac,
            product: id,
            modes: vec![(1920, 1080, 60.0)],
            current_mode: Some((1920, 1080, 60.0)),
            brightness_parameter: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub displays: Vec<FakeDisplay>,
    /// Replaces the online list when set
    pub online_override: Option<Vec<DisplayId>>,
    pub begin_fails: bool,
    pub commit_fails: bool,
    pub pending_enable: Vec<(DisplayId, bool)>,
    pub pending_modes: Vec<(DisplayId, Shape)>,
    pub begun: u32,
    pub commits: u32,
    pub cancels: u32,
}

impl FakeState {
    fn display(&self, id: DisplayId) -> Option<&FakeDisplay> {
        self.displays.iter().find(|d| d.id == id)
    }

    fn display_mut(&mut self, id: DisplayId) -> Option<&mut FakeDisplay> {
        self.displays.iter_mut().find(|d| d.id == id)
    }
}

/// Handle payload the fake puts into [`ModeHandle`]s
#[derive(Debug, Clone, Copy)]
struct FakeMode(Shape);

fn raw_mode(shape: Shape) -> RawMode {
    RawMode {
        width: shape.0,
        height: shape.1,
        refresh_rate: shape.2,
        handle: ModeHandle::new(FakeMode(shape)),
    }
}

#[derive(Debug, Clone)]
pub struct FakeSystem {
    state: Rc<RefCell<FakeState>>,
}

impl FakeSystem {
    pub fn new(displays: Vec<FakeDisplay>) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState {
                displays,
                ..Default::default()
            })),
        }
    }

    pub fn state(&self) -> Rc<RefCell<FakeState>> {
        self.state.clone()
    }

    fn with<T>(&self, id: DisplayId, f: impl FnOnce(&FakeDisplay) -> T) -> Option<T> {
        self.state.borrow().display(id).map(f)
    }
}

impl DisplaySystem for FakeSystem {
    fn online_displays(&self, capacity: usize) -> Option<Vec<DisplayId>> {
        let state = self.state.borrow();
        let ids = match &state.online_override {
            Some(ids) => ids.clone(),
            None => state
                .displays
                .iter()
                .filter(|d| d.online)
                .map(|d| d.id)
                .collect(),
        };
        Some(ids.into_iter().take(capacity).collect())
    }

    fn is_online(&self, display: DisplayId) -> bool {
        self.with(display, |d| d.online).unwrap_or(false)
    }

    fn is_active(&self, display: DisplayId) -> bool {
        self.with(display, |d| d.active).unwrap_or(false)
    }

    fn is_builtin(&self, display: DisplayId) -> bool {
        self.with(display, |d| d.builtin).unwrap_or(false)
    }

    fn target(&self, display: DisplayId) -> DisplayTarget {
        let (vendor, product) = self
            .with(display, |d| (d.vendor, d.product))
            .unwrap_or_default();
        DisplayTarget {
            id: display,
            vendor,
            product,
        }
    }

    fn localized_name(&self, display: DisplayId) -> Option<String> {
        self.with(display, |d| d.name.clone()).flatten()
    }

    fn begin_configuration(&self) -> Option<Box<dyn ConfigTransaction + '_>> {
        let mut state = self.state.borrow_mut();
        if state.begin_fails {
            return None;
        }
        state.begun += 1;
        Some(Box::new(FakeTransaction {
            state: self.state.clone(),
            finished: false,
        }))
    }

    fn all_modes(&self, display: DisplayId) -> Vec<RawMode> {
        self.with(display, |d| d.modes.iter().copied().map(raw_mode).collect())
            .unwrap_or_default()
    }

    fn current_mode(&self, display: DisplayId) -> Option<RawMode> {
        self.with(display, |d| d.current_mode.map(raw_mode)).flatten()
    }

    fn float_parameter(&self, display: DisplayId, key: &str) -> Option<f32> {
        if key != "brightness" {
            return None;
        }
        self.with(display, |d| d.brightness_parameter).flatten()
    }

    fn set_float_parameter(&self, display: DisplayId, key: &str, value: f32) -> bool {
        if key != "brightness" {
            return false;
        }
        let mut state = self.state.borrow_mut();
        match state.display_mut(display) {
            Some(d) if d.brightness_parameter.is_some() => {
                d.brightness_parameter = Some(value);
                true
            }
            _ => false,
        }
    }
}

/// Stages changes in [`FakeState`] and applies them on commit
struct FakeTransaction {
    state: Rc<RefCell<FakeState>>,
    finished: bool,
}

impl FakeTransaction {
    fn discard(&mut self) {
        let mut state = self.state.borrow_mut();
        state.pending_enable.clear();
        state.pending_modes.clear();
        state.cancels += 1;
        self.finished = true;
    }
}

impl ConfigTransaction for FakeTransaction {
    fn raw(&self) -> RawConfigRef {
        RawConfigRef(std::ptr::null_mut())
    }

    fn configure_mode(&mut self, display: DisplayId, mode: &ModeHandle) -> bool {
        match mode.downcast_ref::<FakeMode>() {
            Some(FakeMode(shape)) => {
                self.state.borrow_mut().pending_modes.push((display, *shape));
                true
            }
            None => false,
        }
    }

    fn commit(mut self: Box<Self>) -> bool {
        if self.state.borrow().commit_fails {
            self.discard();
            return false;
        }
        let mut state = self.state.borrow_mut();
        for (id, enabled) in std::mem::take(&mut state.pending_enable) {
            if let Some(d) = state.display_mut(id) {
                d.active = enabled;
                d.online = enabled;
            }
        }
        for (id, shape) in std::mem::take(&mut state.pending_modes) {
            if let Some(d) = state.display_mut(id) {
                d.current_mode = Some(shape);
            }
        }
        state.commits += 1;
        drop(state);
        self.finished = true;
        true
    }

    fn cancel(mut self: Box<Self>) {
        self.discard();
    }
}

impl Drop for FakeTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.discard();
        }
    }
}

/// How often each capability was resolved
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveCounts {
    pub display_list: u32,
    pub display_enable: u32,
    pub brightness: u32,
    pub av_i2c: u32,
}

/// What the fake privileged services see and do
#[derive(Debug, Default)]
pub struct PrivateState {
    /// Replaces the privileged list when set
    pub private_list: Option<Vec<DisplayId>>,
    /// Non-zero makes every enable call fail with this status
    pub enable_status: i32,
    pub brightness: HashMap<DisplayId, f32>,
    pub av_frames: Vec<(DisplayId, SetVcpFrame)>,
}

/// Capability provider that counts resolutions
pub struct CountingProvider {
    present: bool,
    system: Option<FakeSystem>,
    counts: Rc<RefCell<ResolveCounts>>,
    state: Rc<RefCell<PrivateState>>,
}

impl CountingProvider {
    /// Every capability missing, like an old OS
    pub fn absent() -> Self {
        Self {
            present: false,
            system: None,
            counts: Rc::default(),
            state: Rc::default(),
        }
    }

    /// Every capability present, not attached to a display system
    pub fn present() -> Self {
        Self {
            present: true,
            ..Self::absent()
        }
    }

    /// Every capability present and acting on `system`
    pub fn present_for(system: &FakeSystem) -> Self {
        Self {
            present: true,
            system: Some(system.clone()),
            ..Self::absent()
        }
    }

    pub fn counts(&self) -> Rc<RefCell<ResolveCounts>> {
        self.counts.clone()
    }

    pub fn state(&self) -> Rc<RefCell<PrivateState>> {
        self.state.clone()
    }
}

impl CapabilityProvider for CountingProvider {
    fn display_list(&self) -> Capability<Box<dyn DisplayListing>> {
        self.counts.borrow_mut().display_list += 1;
        let listing: Option<Box<dyn DisplayListing>> = self.present.then(|| {
            Box::new(FakeListing {
                system: self.system.clone(),
                state: self.state.clone(),
            }) as Box<dyn DisplayListing>
        });
        listing.into()
    }

    fn display_enable(&self) -> Capability<Box<dyn DisplayEnabler>> {
        self.counts.borrow_mut().display_enable += 1;
        let enabler: Option<Box<dyn DisplayEnabler>> = self.present.then(|| {
            Box::new(FakeEnabler {
                system: self.system.clone(),
                state: self.state.clone(),
            }) as Box<dyn DisplayEnabler>
        });
        enabler.into()
    }

    fn brightness(&self) -> Capability<Box<dyn BrightnessService>> {
        self.counts.borrow_mut().brightness += 1;
        let service: Option<Box<dyn BrightnessService>> = self.present.then(|| {
            Box::new(FakeBrightness {
                state: self.state.clone(),
            }) as Box<dyn BrightnessService>
        });
        service.into()
    }

    fn av_i2c(&self) -> Capability<Box<dyn I2cTransport>> {
        self.counts.borrow_mut().av_i2c += 1;
        let transport: Option<Box<dyn I2cTransport>> = self.present.then(|| {
            Box::new(FakeAvTransport {
                state: self.state.clone(),
            }) as Box<dyn I2cTransport>
        });
        transport.into()
    }
}

struct FakeListing {
    system: Option<FakeSystem>,
    state: Rc<RefCell<PrivateState>>,
}

impl DisplayListing for FakeListing {
    fn list(&self, capacity: usize) -> Option<Vec<DisplayId>> {
        if let Some(list) = &self.state.borrow().private_list {
            return Some(list.iter().copied().take(capacity).collect());
        }
        let system = self.system.as_ref()?;
        let state = system.state.borrow();
        Some(state.displays.iter().map(|d| d.id).take(capacity).collect())
    }
}

struct FakeEnabler {
    system: Option<FakeSystem>,
    state: Rc<RefCell<PrivateState>>,
}

impl DisplayEnabler for FakeEnabler {
    fn set_enabled(
        &self,
        _transaction: &dyn ConfigTransaction,
        display: DisplayId,
        enabled: bool,
    ) -> Result<(), i32> {
        let status = self.state.borrow().enable_status;
        if status != 0 {
            return Err(status);
        }
        match &self.system {
            Some(system) => {
                system
                    .state
                    .borrow_mut()
                    .pending_enable
                    .push((display, enabled));
                Ok(())
            }
            None => Err(-1),
        }
    }
}

struct FakeBrightness {
    state: Rc<RefCell<PrivateState>>,
}

impl BrightnessService for FakeBrightness {
    fn get(&self, display: DisplayId) -> Option<f32> {
        self.state.borrow().brightness.get(&display).copied()
    }

    fn set(&self, display: DisplayId, level: f32) -> bool {
        self.state.borrow_mut().brightness.insert(display, level);
        true
    }
}

struct FakeAvTransport {
    state: Rc<RefCell<PrivateState>>,
}

impl Backend for FakeAvTransport {
    fn name(&self) -> &'static str {
        "fake-av"
    }
}

impl I2cTransport for FakeAvTransport {
    fn write(&self, target: &DisplayTarget, frame: &SetVcpFrame) -> Result<(), BackendError> {
        self.state.borrow_mut().av_frames.push((target.id, *frame));
        Ok(())
    }
}

/// I2C transport that records every frame it is asked to send
pub struct RecordingTransport {
    name: &'static str,
    fails: Rc<Cell<bool>>,
    frames: Rc<RefCell<Vec<(DisplayId, SetVcpFrame)>>>,
}

impl RecordingTransport {
    pub fn succeeding(name: &'static str) -> Self {
        Self {
            name,
            fails: Rc::new(Cell::new(false)),
            frames: Rc::default(),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        let transport = Self::succeeding(name);
        transport.fails.set(true);
        transport
    }

    /// Switch between failing and succeeding after the transport is handed out
    pub fn fails(&self) -> Rc<Cell<bool>> {
        self.fails.clone()
    }

    pub fn frames(&self) -> Rc<RefCell<Vec<(DisplayId, SetVcpFrame)>>> {
        self.frames.clone()
    }
}

impl Backend for RecordingTransport {
    fn name(&self) -> &'static str {
        self.name
    }
}

impl I2cTransport for RecordingTransport {
    fn write(&self, target: &DisplayTarget, frame: &SetVcpFrame) -> Result<(), BackendError> {
        self.frames.borrow_mut().push((target.id, *frame));
        if self.fails.get() {
            Err(BackendError::Failed("no I2C interface".into()))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceState {
    pub frame: Frame,
    pub opacity: f64,
    pub visible: bool,
}

#[derive(Debug, Default)]
pub struct HostState {
    pub screens: Vec<ScreenFrame>,
    pub surfaces: HashMap<DisplayId, SurfaceState>,
    pub fail_create: bool,
    /// Surfaces created so far
    pub created: u32,
}

/// Overlay host keeping surfaces as plain records
pub struct RecordingHost {
    state: Rc<RefCell<HostState>>,
}

impl RecordingHost {
    pub fn new(screens: Vec<(DisplayId, Frame)>) -> Self {
        let screens = screens
            .into_iter()
            .map(|(display, frame)| ScreenFrame { display, frame })
            .collect();
        Self {
            state: Rc::new(RefCell::new(HostState {
                screens,
                ..Default::default()
            })),
        }
    }

    pub fn state(&self) -> Rc<RefCell<HostState>> {
        self.state.clone()
    }
}

impl OverlayHost for RecordingHost {
    fn screens(&self) -> Vec<ScreenFrame> {
        self.state.borrow().screens.clone()
    }

    fn create_surface(
        &mut self,
        display: DisplayId,
        frame: Frame,
    ) -> Option<Box<dyn OverlaySurface>> {
        let mut state = self.state.borrow_mut();
        if state.fail_create {
            return None;
        }
        state.created += 1;
        state.surfaces.insert(
            display,
            SurfaceState {
                frame,
                opacity: 0.0,
                visible: false,
            },
        );
        Some(Box::new(RecordingSurface {
            display,
            state: self.state.clone(),
        }))
    }
}

struct RecordingSurface {
    display: DisplayId,
    state: Rc<RefCell<HostState>>,
}

impl RecordingSurface {
    fn update(&self, f: impl FnOnce(&mut SurfaceState)) {
        if let Some(surface) = self.state.borrow_mut().surfaces.get_mut(&self.display) {
            f(surface);
        }
    }
}

impl OverlaySurface for RecordingSurface {
    fn set_frame(&mut self, frame: Frame) {
        self.update(|s| s.frame = frame);
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.update(|s| s.opacity = opacity);
    }

    fn show(&mut self) {
        self.update(|s| s.visible = true);
    }

    fn hide(&mut self) {
        self.update(|s| s.visible = false);
    }
}
