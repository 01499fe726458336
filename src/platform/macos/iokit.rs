// SPDX-License-Identifier: GPL-3.0-only
//! IOKit service lookup and the classic framebuffer I2C transport
//!
//! IOKit objects are reference counted mach ports. Every object and iterator
//! obtained here is wrapped so it is released on every exit path.

use std::ffi::CStr;
use std::ptr::NonNull;

use objc2_core_foundation::{CFNumber, CFRetained, CFString};

use crate::backend::{Backend, BackendError};
use crate::ddc::{self, SetVcpFrame};
use crate::display::DisplayTarget;
use crate::i2c::I2cTransport;

use super::ffi;

/// An owned IOKit object
#[derive(Debug)]
pub struct IoObject(ffi::io_object_t);

impl IoObject {
    fn new(raw: ffi::io_object_t) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn raw(&self) -> ffi::io_object_t {
        self.0
    }

    fn conforms_to(&self, class: &CStr) -> bool {
        // SAFETY: self.0 is a live object and class is NUL-terminated.
        unsafe { ffi::IOObjectConformsTo(self.0, class.as_ptr()) != 0 }
    }

    /// Read a float parameter on a display service
    pub fn float_parameter(&self, key: &str) -> Option<f32> {
        let key = CFString::from_str(key);
        let mut value = 0.0f32;
        // SAFETY: live service, valid CFString and out pointer.
        let status = unsafe { ffi::IODisplayGetFloatParameter(self.0, 0, &key, &mut value) };
        (status == ffi::kIOReturnSuccess).then_some(value)
    }

    /// Write a float parameter on a display service
    pub fn set_float_parameter(&self, key: &str, value: f32) -> bool {
        let key = CFString::from_str(key);
        // SAFETY: live service and valid CFString.
        let status = unsafe { ffi::IODisplaySetFloatParameter(self.0, 0, &key, value) };
        status == ffi::kIOReturnSuccess
    }
}

impl Drop for IoObject {
    fn drop(&mut self) {
        // SAFETY: we own one reference to this object.
        unsafe {
            ffi::IOObjectRelease(self.0);
        }
    }
}

/// An owned IOKit iterator yielding owned objects
pub struct IoIterator(IoObject);

impl Iterator for IoIterator {
    type Item = IoObject;

    fn next(&mut self) -> Option<IoObject> {
        // SAFETY: the iterator is live for as long as self.
        IoObject::new(unsafe { ffi::IOIteratorNext(self.0.raw()) })
    }
}

/// Every registered service of an IOKit class
pub fn matching_services(class: &CStr) -> Option<IoIterator> {
    // SAFETY: class is NUL-terminated; the matching dictionary reference
    // is consumed by IOServiceGetMatchingServices.
    unsafe {
        let matching = ffi::IOServiceMatching(class.as_ptr());
        if matching.is_null() {
            return None;
        }
        let mut iterator: ffi::io_iterator_t = 0;
        let status =
            ffi::IOServiceGetMatchingServices(ffi::kIOMainPortDefault, matching, &mut iterator);
        if status != ffi::KERN_SUCCESS {
            debug!(class = ?class, status, "IOServiceGetMatchingServices failed");
            return None;
        }
        IoObject::new(iterator).map(IoIterator)
    }
}

/// The display connection service whose vendor and product match `target`
pub fn find_display_service(target: &DisplayTarget) -> Option<IoObject> {
    matching_services(c"IODisplayConnect")?.find(|service| {
        display_ids(service) == Some((target.vendor, target.product))
    })
}

fn display_ids(service: &IoObject) -> Option<(u32, u32)> {
    // SAFETY: live service; the info dictionary follows the Create Rule.
    let info = unsafe {
        let raw = ffi::IODisplayCreateInfoDictionary(service.raw(), ffi::kIODisplayOnlyPreferredName);
        CFRetained::from_raw(NonNull::new(raw)?)
    };
    // SAFETY: the display info dictionary maps string keys to CF values; the
    // id entries are numbers.
    let info = unsafe { info.cast_unchecked::<CFString, CFNumber>() };
    let number = |key: &str| info.get(&CFString::from_str(key))?.as_i32();
    Some((number("DisplayVendorID")? as u32, number("DisplayProductID")? as u32))
}

/// First service below `service` that speaks I2C
fn find_i2c_interface(service: &IoObject) -> Option<IoObject> {
    let mut iterator: ffi::io_iterator_t = 0;
    // SAFETY: live service, NUL-terminated plane name, valid out pointer.
    let status = unsafe {
        ffi::IORegistryEntryCreateIterator(
            service.raw(),
            ffi::kIOServicePlane.as_ptr(),
            ffi::kIORegistryIterateRecursively,
            &mut iterator,
        )
    };
    if status != ffi::KERN_SUCCESS {
        return None;
    }
    IoObject::new(iterator)
        .map(IoIterator)?
        .find(|child| child.conforms_to(ffi::kIOI2CInterfaceClassName))
}

/// An open I2C connection, closed on drop
struct I2cConnection(ffi::IOI2CConnectRef);

impl I2cConnection {
    fn open(interface: &IoObject) -> Result<Self, BackendError> {
        let mut connect: ffi::IOI2CConnectRef = std::ptr::null_mut();
        // SAFETY: live interface service and valid out pointer.
        let status = unsafe { ffi::IOI2CInterfaceOpen(interface.raw(), 0, &mut connect) };
        if status != ffi::kIOReturnSuccess || connect.is_null() {
            return Err(BackendError::Failed(format!("IOI2CInterfaceOpen returned {status:#x}")));
        }
        Ok(Self(connect))
    }

    /// Single write transaction, no reply
    fn send(&self, frame: &SetVcpFrame) -> Result<(), BackendError> {
        let mut bytes = *frame.as_bytes();
        let mut request = ffi::IOI2CRequest {
            sendTransactionType: ffi::kIOI2CSimpleTransactionType,
            replyTransactionType: ffi::kIOI2CNoTransactionType,
            sendAddress: u32::from(ddc::SEND_ADDRESS),
            replyAddress: u32::from(ddc::REPLY_ADDRESS),
            sendBytes: bytes.len() as u32,
            sendBuffer: bytes.as_mut_ptr() as usize,
            replyBytes: 0,
            ..Default::default()
        };
        // SAFETY: open connection; request and its send buffer outlive the call.
        let status = unsafe { ffi::IOI2CSendRequest(self.0, 0, &mut request) };
        if status != ffi::kIOReturnSuccess {
            return Err(BackendError::Failed(format!("IOI2CSendRequest returned {status:#x}")));
        }
        if request.result != ffi::kIOReturnSuccess {
            return Err(BackendError::Failed(format!("I2C transaction result {:#x}", request.result)));
        }
        Ok(())
    }
}

impl Drop for I2cConnection {
    fn drop(&mut self) {
        // SAFETY: connection opened by IOI2CInterfaceOpen, closed once.
        unsafe {
            ffi::IOI2CInterfaceClose(self.0, 0);
        }
    }
}

/// DDC/CI over the I2C interface below a display's framebuffer service
#[derive(Debug, Default)]
pub struct FramebufferI2c;

impl Backend for FramebufferI2c {
    fn name(&self) -> &'static str {
        "framebuffer-i2c"
    }
}

impl I2cTransport for FramebufferI2c {
    fn write(&self, target: &DisplayTarget, frame: &SetVcpFrame) -> Result<(), BackendError> {
        let service = find_display_service(target).ok_or_else(|| {
            BackendError::Failed(format!(
                "no display service for vendor {:#x} product {:#x}",
                target.vendor, target.product
            ))
        })?;
        let interface = find_i2c_interface(&service)
            .ok_or_else(|| BackendError::Failed("display service has no I2C interface".into()))?;
        let connection = I2cConnection::open(&interface)?;
        connection.send(frame)
    }
}
