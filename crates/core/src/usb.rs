//! libusb backend: raw control transfers through `rusb`.

use crate::error::{Error, Result};
use crate::protocol::ControlSetup;
use crate::transport::{ControlLink, UsbBackend};
use rusb::{DeviceHandle, GlobalContext};
use std::time::Duration;
use tracing::{debug, trace};

/// Map a libusb failure onto the core error type.
fn usb_error(operation: &str, err: rusb::Error) -> Error {
    let msg = format!("{operation}: {err}");
    match err {
        rusb::Error::Timeout => Error::Timeout(msg),
        rusb::Error::Access => Error::PermissionDenied(msg),
        rusb::Error::NoDevice | rusb::Error::NotFound => Error::DeviceNotFound(msg),
        rusb::Error::NotSupported => Error::Unsupported(msg),
        _ => Error::Usb(msg),
    }
}

/// Enumerates devices through the global libusb context.
pub struct LibusbBackend {
    timeout: Duration,
}

impl LibusbBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl UsbBackend for LibusbBackend {
    fn name(&self) -> &'static str {
        "libusb"
    }

    fn attached_ids(&self) -> Result<Vec<(u16, u16)>> {
        let devices = rusb::devices().map_err(|e| usb_error("enumerate", e))?;
        let mut ids = Vec::new();
        for device in devices.iter() {
            match device.device_descriptor() {
                Ok(descriptor) => ids.push((descriptor.vendor_id(), descriptor.product_id())),
                Err(e) => trace!(
                    bus = device.bus_number(),
                    address = device.address(),
                    error = %e,
                    "Skipping device without descriptor"
                ),
            }
        }
        Ok(ids)
    }

    fn open(&self, vid: u16, pid: u16) -> Result<Option<Box<dyn ControlLink>>> {
        // open_device_with_vid_pid reports permission errors as absence.
        let devices = rusb::devices().map_err(|e| usb_error("enumerate", e))?;
        for device in devices.iter() {
            let Ok(descriptor) = device.device_descriptor() else {
                continue;
            };
            if descriptor.vendor_id() != vid || descriptor.product_id() != pid {
                continue;
            }

            let handle = device.open().map_err(|e| {
                usb_error(&format!("open VID=0x{vid:04X} PID=0x{pid:04X}"), e)
            })?;
            debug!(
                vid = format_args!("0x{:04X}", vid),
                pid = format_args!("0x{:04X}", pid),
                bus = device.bus_number(),
                address = device.address(),
                "Opened USB device"
            );
            return Ok(Some(Box::new(LibusbLink {
                handle,
                timeout: self.timeout,
            })));
        }
        Ok(None)
    }
}

struct LibusbLink {
    handle: DeviceHandle<GlobalContext>,
    timeout: Duration,
}

impl ControlLink for LibusbLink {
    fn claim_interface(&mut self, interface: u8) -> Result<()> {
        // usbhid owns interface 0 on Linux; detach it while claimed.
        if let Err(e) = self.handle.set_auto_detach_kernel_driver(true) {
            trace!(error = %e, "Kernel driver auto-detach unavailable");
        }

        let config = self
            .handle
            .device()
            .config_descriptor(0)
            .map_err(|e| usb_error("read config descriptor", e))?
            .number();
        if self.handle.active_configuration().ok() != Some(config) {
            self.handle
                .set_active_configuration(config)
                .map_err(|e| usb_error("set configuration", e))?;
        }

        self.handle
            .claim_interface(interface)
            .map_err(|e| usb_error("claim interface", e))
    }

    fn release_interface(&mut self, interface: u8) -> Result<()> {
        self.handle
            .release_interface(interface)
            .map_err(|e| usb_error("release interface", e))
    }

    fn write_control(&mut self, setup: ControlSetup, data: &[u8]) -> Result<usize> {
        self.handle
            .write_control(
                setup.request_type,
                setup.request,
                setup.value,
                setup.index,
                data,
                self.timeout,
            )
            .map_err(|e| usb_error("control OUT", e))
    }

    fn read_control(&mut self, setup: ControlSetup, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        let n = self
            .handle
            .read_control(
                setup.request_type,
                setup.request,
                setup.value,
                setup.index,
                &mut buf,
                self.timeout,
            )
            .map_err(|e| usb_error("control IN", e))?;
        buf.truncate(n);
        Ok(buf)
    }
}
