// SPDX-License-Identifier: GPL-3.0-only
//! Undocumented macOS display services, bound at runtime
//!
//! None of these are linked. Each one is looked up by symbol name when the
//! engine first needs it and simply reported unavailable if the library or
//! symbol is missing on this OS version.

use std::ffi::c_void;
use std::ptr::NonNull;

use objc2_core_foundation::{CFRetained, CFType};
use objc2_core_graphics::CGError;

use crate::backend::{Backend, BackendError};
use crate::capability::{
    BrightnessService, Capability, CapabilityProvider, DisplayEnabler, DisplayListing,
    SharedLibrary,
};
use crate::ddc::{self, SetVcpFrame};
use crate::display::{DisplayId, DisplayTarget};
use crate::i2c::I2cTransport;
use crate::system::ConfigTransaction;

use super::ffi;
use super::iokit;

const DISPLAY_SERVICES: &str =
    "/System/Library/PrivateFrameworks/DisplayServices.framework/DisplayServices";
const CORE_GRAPHICS: &str = "/System/Library/Frameworks/CoreGraphics.framework/CoreGraphics";

type GetDisplayListFn = unsafe extern "C" fn(u32, *mut u32, *mut u32) -> i32;
type ConfigureDisplayEnabledFn = unsafe extern "C" fn(*mut c_void, u32, bool) -> i32;
type GetBrightnessFn = unsafe extern "C" fn(u32, *mut f32) -> i32;
type SetBrightnessFn = unsafe extern "C" fn(u32, f32) -> i32;
type AvServiceCreateFn = unsafe extern "C" fn(*const c_void, ffi::io_service_t) -> *mut CFType;
type AvServiceWriteI2cFn =
    unsafe extern "C" fn(*const CFType, u32, u32, *mut c_void, u32) -> ffi::IOReturn;

/// Resolves capabilities from the system's private frameworks
#[derive(Debug, Default)]
pub struct PrivateFrameworks;

impl CapabilityProvider for PrivateFrameworks {
    fn display_list(&self) -> Capability<Box<dyn DisplayListing>> {
        let listing = SharedLibrary::open(CORE_GRAPHICS).and_then(|library| {
            // SAFETY: signature of CGSGetDisplayList.
            let list = unsafe { library.function::<GetDisplayListFn>("CGSGetDisplayList") }?;
            Some(Box::new(PrivateDisplayList {
                _library: library,
                list,
            }) as Box<dyn DisplayListing>)
        });
        listing.into()
    }

    fn display_enable(&self) -> Capability<Box<dyn DisplayEnabler>> {
        let enabler = SharedLibrary::open(CORE_GRAPHICS).and_then(|library| {
            // SAFETY: signature of CGSConfigureDisplayEnabled.
            let configure = unsafe {
                library.function::<ConfigureDisplayEnabledFn>("CGSConfigureDisplayEnabled")
            }?;
            Some(Box::new(PrivateEnabler {
                _library: library,
                configure,
            }) as Box<dyn DisplayEnabler>)
        });
        enabler.into()
    }

    fn brightness(&self) -> Capability<Box<dyn BrightnessService>> {
        let service = SharedLibrary::open(DISPLAY_SERVICES).and_then(|library| {
            // SAFETY: signatures of the DisplayServices brightness calls.
            let get = unsafe { library.function::<GetBrightnessFn>("DisplayServicesGetBrightness") }?;
            let set = unsafe { library.function::<SetBrightnessFn>("DisplayServicesSetBrightness") }?;
            Some(Box::new(DisplayServicesBrightness {
                _library: library,
                get,
                set,
            }) as Box<dyn BrightnessService>)
        });
        service.into()
    }

    fn av_i2c(&self) -> Capability<Box<dyn I2cTransport>> {
        let transport = SharedLibrary::this_process().and_then(|process| {
            // SAFETY: signatures of the IOAVService calls.
            let create =
                unsafe { process.function::<AvServiceCreateFn>("IOAVServiceCreateWithService") }?;
            let write = unsafe { process.function::<AvServiceWriteI2cFn>("IOAVServiceWriteI2C") }?;
            Some(Box::new(AvServiceI2c {
                _library: process,
                create,
                write,
            }) as Box<dyn I2cTransport>)
        });
        transport.into()
    }
}

struct PrivateDisplayList {
    _library: SharedLibrary,
    list: GetDisplayListFn,
}

impl DisplayListing for PrivateDisplayList {
    fn list(&self, capacity: usize) -> Option<Vec<DisplayId>> {
        let mut ids = vec![0u32; capacity];
        let mut count = 0u32;
        // SAFETY: buffer holds `capacity` ids and the library is loaded.
        let status = unsafe { (self.list)(capacity as u32, ids.as_mut_ptr(), &mut count) };
        if status != CGError::Success.0 {
            debug!(status, "CGSGetDisplayList failed");
            return None;
        }
        ids.truncate(count as usize);
        Some(ids)
    }
}

struct PrivateEnabler {
    _library: SharedLibrary,
    configure: ConfigureDisplayEnabledFn,
}

impl DisplayEnabler for PrivateEnabler {
    fn set_enabled(
        &self,
        transaction: &dyn ConfigTransaction,
        display: DisplayId,
        enabled: bool,
    ) -> Result<(), i32> {
        // SAFETY: the transaction is open for the duration of this call.
        let status = unsafe { (self.configure)(transaction.raw().0, display, enabled) };
        if status == CGError::Success.0 {
            Ok(())
        } else {
            Err(status)
        }
    }
}

struct DisplayServicesBrightness {
    _library: SharedLibrary,
    get: GetBrightnessFn,
    set: SetBrightnessFn,
}

impl BrightnessService for DisplayServicesBrightness {
    fn get(&self, display: DisplayId) -> Option<f32> {
        let mut level = 0.0f32;
        // SAFETY: valid out pointer and the library is loaded.
        let status = unsafe { (self.get)(display, &mut level) };
        (status == 0).then_some(level)
    }

    fn set(&self, display: DisplayId, level: f32) -> bool {
        // SAFETY: the library is loaded.
        unsafe { (self.set)(display, level) == 0 }
    }
}

/// DDC/CI through the AV service proxy of Apple silicon display controllers
struct AvServiceI2c {
    _library: SharedLibrary,
    create: AvServiceCreateFn,
    write: AvServiceWriteI2cFn,
}

impl Backend for AvServiceI2c {
    fn name(&self) -> &'static str {
        "av-service-i2c"
    }
}

impl I2cTransport for AvServiceI2c {
    fn write(&self, target: &DisplayTarget, frame: &SetVcpFrame) -> Result<(), BackendError> {
        // The proxy cannot be matched to a display; the first one is used.
        let proxy = iokit::matching_services(c"DCPAVServiceProxy")
            .and_then(|mut services| services.next())
            .ok_or_else(|| BackendError::Failed("no AV service proxy".into()))?;

        // SAFETY: live service, default allocator; the result is +1 or null.
        let service = NonNull::new(unsafe { (self.create)(std::ptr::null(), proxy.raw()) })
            .map(|raw| unsafe { CFRetained::from_raw(raw) })
            .ok_or_else(|| BackendError::Failed("could not create AV service".into()))?;
        drop(proxy);

        let mut bytes = *frame.as_bytes();
        // SAFETY: live AV service; buffer outlives the call.
        let status = unsafe {
            (self.write)(
                &*service,
                u32::from(ddc::SEND_ADDRESS),
                u32::from(ddc::HOST_ADDRESS),
                bytes.as_mut_ptr() as *mut c_void,
                bytes.len() as u32,
            )
        };
        if status == ffi::kIOReturnSuccess {
            Ok(())
        } else {
            Err(BackendError::Failed(format!(
                "IOAVServiceWriteI2C returned {status:#x} for display {}",
                target.id
            )))
        }
    }
}
