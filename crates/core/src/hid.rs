//! hidapi backend: the OS HID driver carries the reports.
//!
//! HID feature reports are exactly the SET_REPORT / GET_REPORT class control
//! transfers the battery protocol uses, so this backend serves platforms where
//! libusb cannot claim the interface away from the HID driver. The driver
//! owns the interface, so claim and release are no-ops, and hidapi offers no
//! per-transfer timeout.

use crate::error::{Error, Result};
use crate::protocol::ControlSetup;
use crate::transport::{ControlLink, UsbBackend, BATTERY_INTERFACE};
use tracing::{debug, trace};

fn hid_error(operation: &str, err: hidapi::HidError) -> Error {
    Error::Usb(format!("hidapi {operation}: {err}"))
}

/// Opens devices through hidapi.
pub struct HidapiBackend;

impl HidapiBackend {
    /// Check that hidapi can initialise before committing to this backend.
    pub fn new() -> Result<Self> {
        hidapi::HidApi::new().map_err(|e| hid_error("init", e))?;
        Ok(Self)
    }
}

impl UsbBackend for HidapiBackend {
    fn name(&self) -> &'static str {
        "hidapi"
    }

    fn attached_ids(&self) -> Result<Vec<(u16, u16)>> {
        let api = hidapi::HidApi::new().map_err(|e| hid_error("init", e))?;
        let mut ids: Vec<(u16, u16)> = api
            .device_list()
            .map(|info| (info.vendor_id(), info.product_id()))
            .collect();
        // One entry per HID interface; collapse to one per device.
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn open(&self, vid: u16, pid: u16) -> Result<Option<Box<dyn ControlLink>>> {
        let api = hidapi::HidApi::new().map_err(|e| hid_error("init", e))?;

        let candidates: Vec<&hidapi::DeviceInfo> = api
            .device_list()
            .filter(|info| info.vendor_id() == vid && info.product_id() == pid)
            .collect();
        let Some(info) = candidates
            .iter()
            .find(|info| info.interface_number() == i32::from(BATTERY_INTERFACE))
            .or_else(|| candidates.first())
        else {
            return Ok(None);
        };

        let device = api.open_path(info.path()).map_err(|e| {
            hid_error(
                &format!("open VID=0x{vid:04X} PID=0x{pid:04X}"),
                e,
            )
        })?;
        debug!(
            vid = format_args!("0x{:04X}", vid),
            pid = format_args!("0x{:04X}", pid),
            interface = info.interface_number(),
            path = %info.path().to_string_lossy(),
            "Opened HID device"
        );
        Ok(Some(Box::new(HidapiLink { device })))
    }
}

struct HidapiLink {
    device: hidapi::HidDevice,
}

/// Feature report id carried in the low byte of wValue.
fn report_id(setup: ControlSetup) -> u8 {
    (setup.value & 0xFF) as u8
}

fn check_setup(setup: ControlSetup, expected: ControlSetup) -> Result<()> {
    if setup.request_type != expected.request_type
        || setup.request != expected.request
        || setup.value >> 8 != expected.value >> 8
    {
        return Err(Error::Unsupported(format!(
            "hidapi only carries feature reports, not request 0x{:02X}/0x{:02X}",
            setup.request_type, setup.request
        )));
    }
    Ok(())
}

impl ControlLink for HidapiLink {
    fn claim_interface(&mut self, interface: u8) -> Result<()> {
        trace!(interface, "HID driver owns the interface; nothing to claim");
        Ok(())
    }

    fn release_interface(&mut self, _interface: u8) -> Result<()> {
        Ok(())
    }

    fn write_control(&mut self, setup: ControlSetup, data: &[u8]) -> Result<usize> {
        check_setup(setup, ControlSetup::SET_REPORT)?;
        let mut report = Vec::with_capacity(data.len() + 1);
        report.push(report_id(setup));
        report.extend_from_slice(data);
        self.device
            .send_feature_report(&report)
            .map_err(|e| hid_error("send_feature_report", e))?;
        Ok(data.len())
    }

    fn read_control(&mut self, setup: ControlSetup, length: usize) -> Result<Vec<u8>> {
        check_setup(setup, ControlSetup::GET_REPORT)?;
        let mut report = vec![0u8; length + 1];
        report[0] = report_id(setup);
        let n = self
            .device
            .get_feature_report(&mut report)
            .map_err(|e| hid_error("get_feature_report", e))?;
        // First byte echoes the report id.
        let end = n.clamp(1, report.len());
        Ok(report[1..end].to_vec())
    }
}
