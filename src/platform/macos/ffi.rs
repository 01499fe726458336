// SPDX-License-Identifier: GPL-3.0-only
//! Raw IOKit bindings
//!
//! CoreGraphics and CoreFoundation come from the `objc2-core-graphics` and
//! `objc2-core-foundation` crates. IOKit's display and I2C entry points have
//! no generated bindings, so the handful the engine needs are declared here.
//! Private entry points are never linked; they are bound at runtime through
//! [`crate::capability::SharedLibrary`].

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]
#![allow(dead_code)]

use std::ffi::{c_char, c_void};

use objc2_core_foundation::{CFDictionary, CFString};

// --- IOKit ---

pub type kern_return_t = i32;
pub type IOReturn = i32;
pub type IOOptionBits = u32;
pub type io_object_t = u32;
pub type io_service_t = io_object_t;
pub type io_iterator_t = io_object_t;
pub type mach_port_t = u32;
pub type boolean_t = i32;
pub type IOI2CConnectRef = *mut c_void;

pub const KERN_SUCCESS: kern_return_t = 0;
pub const kIOReturnSuccess: IOReturn = 0;
pub const kIOMainPortDefault: mach_port_t = 0;
pub const kIORegistryIterateRecursively: IOOptionBits = 0x0000_0001;
pub const kIODisplayOnlyPreferredName: IOOptionBits = 0x0000_0200;
pub const kIOI2CNoTransactionType: IOOptionBits = 0;
pub const kIOI2CSimpleTransactionType: IOOptionBits = 1;

pub const kIOServicePlane: &std::ffi::CStr = c"IOService";
pub const kIOI2CInterfaceClassName: &std::ffi::CStr = c"IOI2CInterface";

/// `IOI2CRequest` from `IOKit/i2c/IOI2CInterface.h`, 64-bit layout
#[repr(C)]
#[derive(Debug, Default)]
pub struct IOI2CRequest {
    pub sendTransactionType: IOOptionBits,
    pub replyTransactionType: IOOptionBits,
    pub sendAddress: u32,
    pub replyAddress: u32,
    pub sendSubAddress: u8,
    pub replySubAddress: u8,
    pub __reservedA: [u8; 2],
    pub minReplyDelay: u64,
    pub result: IOReturn,
    pub commFlags: IOOptionBits,
    pub __padA: u32,
    pub sendBytes: u32,
    pub __reservedB: [u32; 2],
    pub __padB: u32,
    pub replyBytes: u32,
    pub completion: Option<extern "C" fn(*mut IOI2CRequest)>,
    pub sendBuffer: usize,
    pub replyBuffer: usize,
    pub __reservedC: [u32; 10],
}

#[link(name = "IOKit", kind = "framework")]
unsafe extern "C" {
    /// Returns a +1 dictionary, or null
    pub fn IOServiceMatching(name: *const c_char) -> *mut CFDictionary;
    /// Consumes one reference to `matching`
    pub fn IOServiceGetMatchingServices(
        main_port: mach_port_t,
        matching: *mut CFDictionary,
        existing: *mut io_iterator_t,
    ) -> kern_return_t;
    pub fn IOIteratorNext(iterator: io_iterator_t) -> io_object_t;
    pub fn IOObjectRelease(object: io_object_t) -> kern_return_t;
    pub fn IOObjectConformsTo(object: io_object_t, class_name: *const c_char) -> boolean_t;
    pub fn IORegistryEntryCreateIterator(
        entry: io_object_t,
        plane: *const c_char,
        options: IOOptionBits,
        iterator: *mut io_iterator_t,
    ) -> kern_return_t;

    /// Returns a +1 dictionary, or null
    pub fn IODisplayCreateInfoDictionary(
        framebuffer: io_service_t,
        options: IOOptionBits,
    ) -> *mut CFDictionary;
    pub fn IODisplayGetFloatParameter(
        service: io_service_t,
        options: IOOptionBits,
        parameter_name: &CFString,
        value: *mut f32,
    ) -> IOReturn;
    pub fn IODisplaySetFloatParameter(
        service: io_service_t,
        options: IOOptionBits,
        parameter_name: &CFString,
        value: f32,
    ) -> IOReturn;

    pub fn IOI2CInterfaceOpen(
        interface: io_service_t,
        options: IOOptionBits,
        connect: *mut IOI2CConnectRef,
    ) -> IOReturn;
    pub fn IOI2CInterfaceClose(connect: IOI2CConnectRef, options: IOOptionBits) -> IOReturn;
    pub fn IOI2CSendRequest(
        connect: IOI2CConnectRef,
        options: IOOptionBits,
        request: *mut IOI2CRequest,
    ) -> IOReturn;
}
