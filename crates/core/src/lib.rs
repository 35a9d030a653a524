//! viper-battery-core: Razer battery protocol, device discovery, and icon compositing.
//!
//! This crate provides the logic for reading the battery level of a Razer
//! Viper V2 Pro through its vendor report protocol over USB control transfers,
//! and for rendering the tray icon that shows it.

pub mod battery;
pub mod comm;
pub mod config;
pub mod device;
pub mod error;
pub mod hid;
pub mod icon;
pub mod protocol;
pub mod transport;
pub mod usb;

/// Razer USB Vendor ID.
pub const RAZER_VID: u16 = 0x1532;

/// Known Viper V2 Pro product IDs.
pub mod pids {
    /// Viper V2 Pro over the cable.
    pub const VIPER_V2_PRO_WIRED: u16 = 0x00A5;
    /// Viper V2 Pro through the HyperSpeed dongle.
    pub const VIPER_V2_PRO_WIRELESS: u16 = 0x00A6;
}
