// SPDX-License-Identifier: GPL-3.0-only
//! Optional system capabilities
//!
//! Some control paths only exist on certain OS versions or hardware: a
//! privileged brightness service, a privileged enable/disable primitive, a
//! privileged display list that includes disabled displays, and an alternate
//! I2C path. Each is located at runtime by symbol lookup and is either
//! [`Capability::Available`] or [`Capability::Unavailable`]. Absence is never
//! an error.
//!
//! A [`CapabilitySet`] resolves every capability at most once, on first use,
//! and keeps the answer for the life of the value. It is constructed
//! explicitly and handed to the engine, so tests can inject a provider that
//! simulates an older OS.

use std::ffi::{c_void, CStr, CString};
use std::fmt;
use std::ptr::NonNull;

use once_cell::unsync::OnceCell;

use crate::display::DisplayId;
use crate::i2c::I2cTransport;
use crate::system::ConfigTransaction;

/// Presence of one optional capability
pub enum Capability<T> {
    Available(T),
    Unavailable,
}

impl<T> Capability<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            Capability::Available(inner) => Some(inner),
            Capability::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => Capability::Available(inner),
            None => Capability::Unavailable,
        }
    }
}

impl<T> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Available(_) => f.write_str("Available"),
            Capability::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// Privileged display listing that also reports logically disabled displays
pub trait DisplayListing {
    /// `None` when the call reports an error status
    fn list(&self, capacity: usize) -> Option<Vec<DisplayId>>;
}

/// Privileged enable/disable primitive, only valid inside a configuration transaction
pub trait DisplayEnabler {
    /// Returns the raw status code on failure
    fn set_enabled(
        &self,
        transaction: &dyn ConfigTransaction,
        display: DisplayId,
        enabled: bool,
    ) -> Result<(), i32>;
}

/// Privileged normalized (0.0-1.0) brightness service
pub trait BrightnessService {
    fn get(&self, display: DisplayId) -> Option<f32>;

    fn set(&self, display: DisplayId, level: f32) -> bool;
}

/// Resolves capabilities; every method is called at most once per [`CapabilitySet`]
pub trait CapabilityProvider {
    fn display_list(&self) -> Capability<Box<dyn DisplayListing>>;

    fn display_enable(&self) -> Capability<Box<dyn DisplayEnabler>>;

    fn brightness(&self) -> Capability<Box<dyn BrightnessService>>;

    fn av_i2c(&self) -> Capability<Box<dyn I2cTransport>>;
}

/// Provider for systems without any optional capability
#[derive(Debug, Default)]
pub struct NoCapabilities;

impl CapabilityProvider for NoCapabilities {
    fn display_list(&self) -> Capability<Box<dyn DisplayListing>> {
        Capability::Unavailable
    }

    fn display_enable(&self) -> Capability<Box<dyn DisplayEnabler>> {
        Capability::Unavailable
    }

    fn brightness(&self) -> Capability<Box<dyn BrightnessService>> {
        Capability::Unavailable
    }

    fn av_i2c(&self) -> Capability<Box<dyn I2cTransport>> {
        Capability::Unavailable
    }
}

/// Lazily resolved, memoized set of optional capabilities
pub struct CapabilitySet {
    provider: Box<dyn CapabilityProvider>,
    display_list: OnceCell<Capability<Box<dyn DisplayListing>>>,
    display_enable: OnceCell<Capability<Box<dyn DisplayEnabler>>>,
    brightness: OnceCell<Capability<Box<dyn BrightnessService>>>,
    av_i2c: OnceCell<Capability<Box<dyn I2cTransport>>>,
}

impl CapabilitySet {
    pub fn new(provider: Box<dyn CapabilityProvider>) -> Self {
        Self {
            provider,
            display_list: OnceCell::new(),
            display_enable: OnceCell::new(),
            brightness: OnceCell::new(),
            av_i2c: OnceCell::new(),
        }
    }

    /// A set where every capability is absent
    pub fn unavailable() -> Self {
        Self::new(Box::new(NoCapabilities))
    }

    pub fn display_list(&self) -> &Capability<Box<dyn DisplayListing>> {
        self.display_list
            .get_or_init(|| logged("private display list", self.provider.display_list()))
    }

    pub fn display_enable(&self) -> &Capability<Box<dyn DisplayEnabler>> {
        self.display_enable
            .get_or_init(|| logged("private display enable", self.provider.display_enable()))
    }

    pub fn brightness(&self) -> &Capability<Box<dyn BrightnessService>> {
        self.brightness
            .get_or_init(|| logged("private brightness", self.provider.brightness()))
    }

    pub fn av_i2c(&self) -> &Capability<Box<dyn I2cTransport>> {
        self.av_i2c
            .get_or_init(|| logged("AV service I2C", self.provider.av_i2c()))
    }

    /// Resolve everything now instead of on first use
    pub fn resolve_all(&self) {
        self.display_list();
        self.display_enable();
        self.brightness();
        self.av_i2c();
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("display_list", &self.display_list.get())
            .field("display_enable", &self.display_enable.get())
            .field("brightness", &self.brightness.get())
            .field("av_i2c", &self.av_i2c.get())
            .finish()
    }
}

fn logged<T>(name: &str, capability: Capability<T>) -> Capability<T> {
    if capability.is_available() {
        info!(capability = name, "Capability available");
    } else {
        info!(capability = name, "Capability unavailable, backends using it will be skipped");
    }
    capability
}

/// A dynamically loaded library, closed on drop
///
/// Symbols bound from a library are only valid while it is open, so whatever
/// holds a bound function must also hold the library.
pub struct SharedLibrary {
    handle: NonNull<c_void>,
    name: String,
}

// SAFETY: dl handles may be used and closed from any thread.
unsafe impl Send for SharedLibrary {}
unsafe impl Sync for SharedLibrary {}

impl SharedLibrary {
    /// Open a library by path, `None` if it does not exist or fails to load
    pub fn open(path: &str) -> Option<Self> {
        let c_path = CString::new(path).ok()?;
        // SAFETY: c_path is a valid NUL-terminated string.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY) };
        match NonNull::new(handle) {
            Some(handle) => Some(Self {
                handle,
                name: path.to_string(),
            }),
            None => {
                debug!(library = path, error = %last_dl_error(), "dlopen failed");
                None
            }
        }
    }

    /// The symbol space of the running process and everything it has loaded
    pub fn this_process() -> Option<Self> {
        // SAFETY: a null path asks for the main program handle.
        let handle = unsafe { libc::dlopen(std::ptr::null(), libc::RTLD_LAZY) };
        NonNull::new(handle).map(|handle| Self {
            handle,
            name: "<process>".to_string(),
        })
    }

    /// Look up a symbol's address
    pub fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        let c_name = CString::new(name).ok()?;
        // SAFETY: handle is a live dlopen handle and c_name is NUL-terminated.
        let ptr = unsafe { libc::dlsym(self.handle.as_ptr(), c_name.as_ptr()) };
        let found = NonNull::new(ptr);
        if found.is_none() {
            debug!(library = %self.name, symbol = name, "Symbol not found");
        }
        found
    }

    /// Bind a symbol as a function pointer of type `F`
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type matching the symbol's real
    /// signature, and the result must not outlive `self`. Types that are not
    /// pointer sized are rejected with `None`.
    pub unsafe fn function<F: Copy>(&self, name: &str) -> Option<F> {
        if std::mem::size_of::<F>() != std::mem::size_of::<*mut c_void>() {
            error!(
                library = %self.name,
                symbol = name,
                ty = std::any::type_name::<F>(),
                "Refusing to bind symbol to a type that is not a function pointer"
            );
            return None;
        }
        let ptr = self.symbol(name)?.as_ptr();
        // SAFETY: sizes match and the caller vouches for the signature.
        Some(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&ptr) })
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        // SAFETY: handle came from dlopen and is closed exactly once.
        unsafe {
            libc::dlclose(self.handle.as_ptr());
        }
    }
}

impl fmt::Debug for SharedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedLibrary({})", self.name)
    }
}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns null or a thread-local NUL-terminated string.
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown error".to_string()
    } else {
        // SAFETY: checked for null above.
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}
