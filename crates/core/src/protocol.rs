//! Razer vendor report encoding and decoding.
//!
//! Every request and response is a fixed 90-byte report exchanged through
//! HID SET_REPORT / GET_REPORT control transfers on interface 0:
//!
//! | offset | field                                 |
//! |--------|---------------------------------------|
//! | 0      | status (0x00 on requests)             |
//! | 1      | transaction id                        |
//! | 2..=3  | remaining packets (unused, zero)      |
//! | 4      | protocol type (unused, zero)          |
//! | 5      | data size                             |
//! | 6      | command class                         |
//! | 7      | command id                            |
//! | 8..=87 | arguments                             |
//! | 88     | checksum                              |
//! | 89     | reserved (zero)                       |
//!
//! Protocol reference: OpenRazer `razercommon.h` (protocol knowledge only).

use crate::error::{Error, Result};

/// Total report length in bytes.
pub const FRAME_LEN: usize = 90;
/// Number of argument bytes carried by a report.
pub const ARGS_LEN: usize = 80;

/// Transaction id used for battery queries.
pub const DEFAULT_TRANSACTION_ID: u8 = 0x1F;

/// Offset of the checksum byte.
pub const CHECKSUM_OFFSET: usize = 88;
/// Offset of the raw battery level inside a response.
pub const BATTERY_OFFSET: usize = 9;

/// Power command class and battery-level command.
pub mod commands {
    /// Command class for power management.
    pub const CLASS_POWER: u8 = 0x07;
    /// Get battery level (argument 1 of the reply holds 0..=255).
    pub const GET_BATTERY_LEVEL: u8 = 0x80;
    /// Data size requested for the battery query.
    pub const BATTERY_DATA_SIZE: u8 = 0x02;
}

/// Setup packet fields of a control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlSetup {
    /// HID SET_REPORT (class, interface, OUT), feature report 0.
    pub const SET_REPORT: ControlSetup = ControlSetup {
        request_type: 0x21,
        request: 0x09,
        value: 0x0300,
        index: 0x00,
    };

    /// HID GET_REPORT (class, interface, IN), feature report 0.
    pub const GET_REPORT: ControlSetup = ControlSetup {
        request_type: 0xA1,
        request: 0x01,
        value: 0x0300,
        index: 0x00,
    };

    /// Whether data flows device-to-host.
    pub fn is_in(&self) -> bool {
        self.request_type & 0x80 != 0
    }
}

/// XOR-fold of the given bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// An outbound 90-byte query frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFrame {
    bytes: [u8; FRAME_LEN],
}

impl QueryFrame {
    /// Build a frame for an arbitrary command with zeroed arguments.
    pub fn new(transaction_id: u8, data_size: u8, command_class: u8, command_id: u8) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[1] = transaction_id;
        bytes[5] = data_size;
        bytes[6] = command_class;
        bytes[7] = command_id;
        // Transaction id through command id, status excluded.
        bytes[CHECKSUM_OFFSET] = checksum(&bytes[1..=7]);
        Self { bytes }
    }

    /// Build the battery-level query.
    pub fn battery(transaction_id: u8) -> Self {
        Self::new(
            transaction_id,
            commands::BATTERY_DATA_SIZE,
            commands::CLASS_POWER,
            commands::GET_BATTERY_LEVEL,
        )
    }

    pub fn transaction_id(&self) -> u8 {
        self.bytes[1]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[CHECKSUM_OFFSET]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Status byte reported by the device at offset 0 of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    New,
    Busy,
    Successful,
    Failure,
    Timeout,
    NotSupported,
    Unknown(u8),
}

impl From<u8> for ResponseStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::New,
            0x01 => Self::Busy,
            0x02 => Self::Successful,
            0x03 => Self::Failure,
            0x04 => Self::Timeout,
            0x05 => Self::NotSupported,
            other => Self::Unknown(other),
        }
    }
}

/// A decoded inbound response.
///
/// Only the length is validated; class, id and status are surfaced for
/// logging but never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame {
    pub status: ResponseStatus,
    pub transaction_id: u8,
    pub command_class: u8,
    pub command_id: u8,
    /// Raw battery level, 0..=255.
    pub battery_raw: u8,
}

impl ResponseFrame {
    /// Decode a raw response buffer.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() <= BATTERY_OFFSET {
            return Err(Error::MalformedResponse {
                len: data.len(),
                expected: BATTERY_OFFSET + 1,
            });
        }

        Ok(Self {
            status: ResponseStatus::from(data[0]),
            transaction_id: data[1],
            command_class: data[6],
            command_id: data[7],
            battery_raw: data[BATTERY_OFFSET],
        })
    }
}
