// SPDX-License-Identifier: GPL-3.0-only
//! DDC/CI (Display Data Channel Command Interface) frame encoding
//!
//! DDC/CI is a standard protocol for controlling monitors over the I2C bus
//! carried by the video cable. Only the "set VCP feature" request is needed
//! here, and only with 8-bit values. The encoded frame is the same for every
//! transport that can deliver it.
//!
//! ```text
//! ┌──────┬──────┬────────┬──────┬─────────┬─────────┬──────────┐
//! │ 0x51 │ 0x84 │ 0x03   │ code │ value_hi│ value_lo│ checksum │
//! │ host │ len  │ set op │      │ (0x00)  │         │          │
//! └──────┴──────┴────────┴──────┴─────────┴─────────┴──────────┘
//! ```

use std::fmt;

/// VCP (Virtual Control Panel) code for brightness
pub const BRIGHTNESS_CODE: u8 = 0x10;

/// 8-bit destination address of the monitor on the DDC bus
pub const DDC_DESTINATION: u8 = 0x6E;

/// 7-bit I2C send address (`0x6E >> 1`)
pub const SEND_ADDRESS: u8 = DDC_DESTINATION >> 1;

/// 7-bit I2C reply address (`0x6F >> 1`)
pub const REPLY_ADDRESS: u8 = 0x6F >> 1;

/// Host (source) address marker, first byte of every host-originated frame
pub const HOST_ADDRESS: u8 = 0x51;

/// Length byte for a 4-byte payload with the DDC/CI length flag set
const SET_VCP_LENGTH: u8 = 0x84;

/// "Set VCP feature" opcode
const SET_VCP_OPCODE: u8 = 0x03;

/// Size of a "set VCP feature" frame in bytes
pub const FRAME_LEN: usize = 7;

/// An encoded "set VCP feature" request
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SetVcpFrame([u8; FRAME_LEN]);

impl SetVcpFrame {
    /// Raw frame bytes, checksum included
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// The VCP code this frame writes
    pub fn control_code(&self) -> u8 {
        self.0[3]
    }

    /// The value this frame writes
    pub fn value(&self) -> u8 {
        self.0[5]
    }
}

impl fmt::Debug for SetVcpFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetVcpFrame({:02x?})", self.0)
    }
}

/// Build a "set VCP feature" frame for `control_code` with an 8-bit `value`
pub fn encode(control_code: u8, value: u8) -> SetVcpFrame {
    let mut frame = [
        HOST_ADDRESS,
        SET_VCP_LENGTH,
        SET_VCP_OPCODE,
        control_code,
        0x00,
        value,
        0x00,
    ];
    frame[FRAME_LEN - 1] = checksum(&frame[..FRAME_LEN - 1]);
    SetVcpFrame(frame)
}

/// XOR checksum seeded with the destination address
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(DDC_DESTINATION, |acc, &b| acc ^ b)
}

/// Convert a normalized brightness level into the 0-100 VCP brightness value
pub fn brightness_value(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * 100.0).round() as u8
}
