//! USB control-transfer transport abstraction.
//!
//! Provides a trait-based transport layer so that the libusb backend, the
//! hidapi backend and mock devices share the same interface.

use crate::error::{Error, Result};
use crate::protocol::ControlSetup;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{trace, warn};

/// Interface carrying the vendor reports.
pub const BATTERY_INTERFACE: u8 = 0;

/// Default timeout applied to each libusb control transfer.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

/// An opened device able to perform control transfers.
pub trait ControlLink: Send {
    /// Select the device configuration and claim `interface`.
    fn claim_interface(&mut self, interface: u8) -> Result<()>;

    /// Release a previously claimed interface.
    fn release_interface(&mut self, interface: u8) -> Result<()>;

    /// Host-to-device control transfer. Returns the number of bytes written.
    fn write_control(&mut self, setup: ControlSetup, data: &[u8]) -> Result<usize>;

    /// Device-to-host control transfer of up to `length` bytes.
    fn read_control(&mut self, setup: ControlSetup, length: usize) -> Result<Vec<u8>>;

    /// Drop any per-transfer state the backend keeps between requests.
    fn dispose(&mut self) {}
}

/// Device enumeration and open.
pub trait UsbBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// (vendor id, product id) of every attached device the backend can see.
    fn attached_ids(&self) -> Result<Vec<(u16, u16)>>;

    /// Open the first device matching `vid`/`pid`, or `None` if absent.
    fn open(&self, vid: u16, pid: u16) -> Result<Option<Box<dyn ControlLink>>>;
}

/// A claimed interface, released when dropped.
pub struct ClaimedInterface<'a> {
    link: &'a mut dyn ControlLink,
    interface: u8,
}

impl<'a> ClaimedInterface<'a> {
    pub fn claim(link: &'a mut dyn ControlLink, interface: u8) -> Result<Self> {
        link.claim_interface(interface)?;
        trace!(interface, "Interface claimed");
        Ok(Self { link, interface })
    }

    pub fn send(&mut self, setup: ControlSetup, data: &[u8]) -> Result<usize> {
        trace!(
            request_type = format_args!("0x{:02X}", setup.request_type),
            request = format_args!("0x{:02X}", setup.request),
            len = data.len(),
            "Control OUT"
        );
        self.link.write_control(setup, data)
    }

    pub fn receive(&mut self, setup: ControlSetup, length: usize) -> Result<Vec<u8>> {
        let data = self.link.read_control(setup, length)?;
        trace!(
            request_type = format_args!("0x{:02X}", setup.request_type),
            request = format_args!("0x{:02X}", setup.request),
            len = data.len(),
            "Control IN"
        );
        Ok(data)
    }

    pub fn dispose(&mut self) {
        self.link.dispose();
    }
}

impl Drop for ClaimedInterface<'_> {
    fn drop(&mut self) {
        match self.link.release_interface(self.interface) {
            Ok(()) => trace!(interface = self.interface, "Interface released"),
            Err(e) => warn!(interface = self.interface, error = %e, "Failed to release interface"),
        }
    }
}

/// Which USB stack to talk to the mouse through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Raw control transfers through libusb.
    #[default]
    Libusb,
    /// Feature reports through the OS HID driver.
    Hidapi,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "libusb" | "usb" | "rusb" => Ok(Self::Libusb),
            "hidapi" | "hid" => Ok(Self::Hidapi),
            other => Err(format!(
                "unknown backend '{other}' (expected 'libusb' or 'hidapi')"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Libusb => write!(f, "libusb"),
            Self::Hidapi => write!(f, "hidapi"),
        }
    }
}

/// Construct the selected backend.
pub fn open_backend(kind: BackendKind, timeout: Duration) -> Result<Box<dyn UsbBackend>> {
    match kind {
        BackendKind::Libusb => Ok(Box::new(crate::usb::LibusbBackend::new(timeout))),
        BackendKind::Hidapi => Ok(Box::new(crate::hid::HidapiBackend::new()?)),
    }
}
