//! Device model: supported mice, discovery, and location.

use crate::error::Result;
use crate::transport::{ControlLink, UsbBackend};
use crate::{pids, RAZER_VID};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// How the mouse reaches the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Through the 2.4 GHz dongle; replies lag behind requests.
    Wireless,
    /// Over the USB cable.
    Wired,
}

impl TransportKind {
    /// Whether the reply needs extra time for the radio round-trip.
    pub fn needs_response_delay(&self) -> bool {
        matches!(self, Self::Wireless)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wireless => write!(f, "wireless"),
            Self::Wired => write!(f, "wired"),
        }
    }
}

/// Supported Razer mouse models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MouseModel {
    ViperV2ProWireless,
    ViperV2ProWired,
}

impl MouseModel {
    /// Lookup order: 0x00A5 first, so a mouse on its cable wins over a
    /// dongle that is still plugged in.
    pub const SEARCH_ORDER: [MouseModel; 2] = [Self::ViperV2ProWired, Self::ViperV2ProWireless];

    /// Look up model from USB vendor and product ID.
    pub fn from_ids(vid: u16, pid: u16) -> Option<Self> {
        if vid != RAZER_VID {
            return None;
        }
        match pid {
            pids::VIPER_V2_PRO_WIRELESS => Some(Self::ViperV2ProWireless),
            pids::VIPER_V2_PRO_WIRED => Some(Self::ViperV2ProWired),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ViperV2ProWireless => "Razer Viper V2 Pro (wireless)",
            Self::ViperV2ProWired => "Razer Viper V2 Pro (wired)",
        }
    }

    /// USB Vendor ID.
    pub fn vid(&self) -> u16 {
        RAZER_VID
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::ViperV2ProWireless => pids::VIPER_V2_PRO_WIRELESS,
            Self::ViperV2ProWired => pids::VIPER_V2_PRO_WIRED,
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            Self::ViperV2ProWireless => TransportKind::Wireless,
            Self::ViperV2ProWired => TransportKind::Wired,
        }
    }
}

/// A mouse found by [`locate`], opened and ready for one poll.
pub struct LocatedMouse {
    pub model: MouseModel,
    pub link: Box<dyn ControlLink>,
}

impl LocatedMouse {
    pub fn is_wireless(&self) -> bool {
        self.model.transport() == TransportKind::Wireless
    }
}

impl fmt::Debug for LocatedMouse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatedMouse")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Find and open the first supported mouse.
///
/// Absence of both models is `Ok(None)`, not an error. Nothing is cached;
/// every call enumerates afresh.
pub fn locate(backend: &dyn UsbBackend) -> Result<Option<LocatedMouse>> {
    for model in MouseModel::SEARCH_ORDER {
        if let Some(link) = backend.open(model.vid(), model.pid())? {
            debug!(
                model = model.name(),
                transport = %model.transport(),
                backend = backend.name(),
                "Located mouse"
            );
            return Ok(Some(LocatedMouse { model, link }));
        }
    }
    debug!(backend = backend.name(), "No supported mouse attached");
    Ok(None)
}

/// Information about a discovered mouse.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub model: MouseModel,
    pub vid: u16,
    pub pid: u16,
    pub transport: TransportKind,
}

/// Discover all attached supported mice.
pub fn discover_devices(backend: &dyn UsbBackend) -> Result<Vec<DeviceInfo>> {
    debug!(backend = backend.name(), "Starting USB device enumeration");

    let mut devices = Vec::new();
    for (vid, pid) in backend.attached_ids()? {
        if let Some(model) = MouseModel::from_ids(vid, pid) {
            info!(
                model = model.name(),
                vid = format_args!("0x{:04X}", vid),
                pid = format_args!("0x{:04X}", pid),
                "Found Razer mouse"
            );
            devices.push(DeviceInfo {
                model,
                vid,
                pid,
                transport: model.transport(),
            });
        }
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::mock::{Call, MockBackend, MockMouse, MockStep};

    #[test]
    fn mouse_model_from_known_ids() {
        assert_eq!(
            MouseModel::from_ids(0x1532, 0x00A5),
            Some(MouseModel::ViperV2ProWired)
        );
        assert_eq!(
            MouseModel::from_ids(0x1532, 0x00A6),
            Some(MouseModel::ViperV2ProWireless)
        );
    }

    #[test]
    fn mouse_model_from_unknown_ids() {
        assert_eq!(MouseModel::from_ids(0x1532, 0x1234), None);
        assert_eq!(MouseModel::from_ids(0x046D, 0x00A5), None);
    }

    #[test]
    fn transport_per_model() {
        assert!(MouseModel::ViperV2ProWireless
            .transport()
            .needs_response_delay());
        assert!(!MouseModel::ViperV2ProWired.transport().needs_response_delay());
    }

    #[test]
    fn locate_none_when_nothing_attached() {
        let mock = MockBackend::new();
        assert!(locate(&mock).unwrap().is_none());
    }

    #[test]
    fn locate_ignores_unrelated_devices() {
        let mock = MockBackend::new();
        mock.attach(0x046D, 0xC08B, MockMouse::responding(1));
        assert!(locate(&mock).unwrap().is_none());
    }

    #[test]
    fn locate_wireless_only() {
        let mock = MockBackend::new();
        mock.attach(RAZER_VID, pids::VIPER_V2_PRO_WIRELESS, MockMouse::responding(1));
        let found = locate(&mock).unwrap().unwrap();
        assert!(found.is_wireless());
        assert_eq!(found.model, MouseModel::ViperV2ProWireless);
    }

    #[test]
    fn locate_wired_only() {
        let mock = MockBackend::new();
        mock.attach(RAZER_VID, pids::VIPER_V2_PRO_WIRED, MockMouse::responding(1));
        let found = locate(&mock).unwrap().unwrap();
        assert!(!found.is_wireless());
        assert_eq!(found.model, MouseModel::ViperV2ProWired);
    }

    #[test]
    fn locate_tries_0x00a5_first() {
        let mock = MockBackend::new();
        mock.attach(RAZER_VID, 0x00A6, MockMouse::responding(1));
        mock.attach(RAZER_VID, 0x00A5, MockMouse::responding(1));
        let found = locate(&mock).unwrap().unwrap();
        assert!(!found.is_wireless());
        assert_eq!(found.model, MouseModel::ViperV2ProWired);
        assert_eq!(mock.calls(), vec![Call::Open(RAZER_VID, 0x00A5)]);
    }

    #[test]
    fn locate_propagates_open_failure() {
        let mock = MockBackend::new();
        mock.attach(
            RAZER_VID,
            pids::VIPER_V2_PRO_WIRED,
            MockMouse::responding(1)
                .failing_at(MockStep::Open, || Error::PermissionDenied("open".into())),
        );
        assert!(matches!(locate(&mock), Err(Error::PermissionDenied(_))));
    }

    #[test]
    fn discover_lists_supported_only() {
        let mock = MockBackend::new();
        mock.attach(0x046D, 0xC08B, MockMouse::responding(1));
        mock.attach(RAZER_VID, pids::VIPER_V2_PRO_WIRED, MockMouse::responding(1));
        let devices = discover_devices(&mock).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].model, MouseModel::ViperV2ProWired);
        assert_eq!(devices[0].transport, TransportKind::Wired);
    }
}
