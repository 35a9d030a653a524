//! Battery level query: one locate → claim → query → reply → release cycle.

use crate::comm::{DeviceStatus, ErrorClass};
use crate::device::{locate, MouseModel};
use crate::error::Result;
use crate::protocol::{
    ControlSetup, QueryFrame, ResponseFrame, ResponseStatus, DEFAULT_TRANSACTION_ID, FRAME_LEN,
};
use crate::transport::{ClaimedInterface, UsbBackend, BATTERY_INTERFACE};
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Time the wireless dongle needs before the reply is ready.
pub const WIRELESS_RESPONSE_DELAY: Duration = Duration::from_millis(530);

/// Scale a raw battery byte (0..=255) to a percentage.
pub fn scale_raw(raw: u8) -> f32 {
    f32::from(raw) / 255.0 * 100.0
}

/// A successful battery measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryLevel {
    pub model: MouseModel,
    pub raw: u8,
}

impl BatteryLevel {
    pub fn percentage(&self) -> f32 {
        scale_raw(self.raw)
    }
}

/// Outcome of one poll: a percentage that is always displayable, plus why.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryReading {
    pub percentage: f32,
    pub status: DeviceStatus,
}

impl BatteryReading {
    /// Reading shown when the battery cannot be read.
    pub fn unavailable(status: DeviceStatus) -> Self {
        Self {
            percentage: 0.0,
            status,
        }
    }
}

/// Reads the battery through a USB backend.
pub struct BatteryReader {
    backend: Box<dyn UsbBackend>,
    transaction_id: u8,
    wireless_delay: Duration,
}

impl BatteryReader {
    pub fn new(backend: Box<dyn UsbBackend>) -> Self {
        Self {
            backend,
            transaction_id: DEFAULT_TRANSACTION_ID,
            wireless_delay: WIRELESS_RESPONSE_DELAY,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: u8) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn with_wireless_delay(mut self, delay: Duration) -> Self {
        self.wireless_delay = delay;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Query the battery once.
    ///
    /// `Ok(None)` means no supported mouse is attached. The interface is
    /// released on every path once claimed.
    pub fn read(&self) -> Result<Option<BatteryLevel>> {
        let Some(mut mouse) = locate(self.backend.as_ref())? else {
            return Ok(None);
        };

        let query = QueryFrame::battery(self.transaction_id);
        let raw = {
            let mut iface = ClaimedInterface::claim(mouse.link.as_mut(), BATTERY_INTERFACE)?;

            debug!(
                transaction_id = format_args!("0x{:02X}", query.transaction_id()),
                frame_hex = format_args!("{:02X?}", query.as_bytes()),
                "Sending message to mouse"
            );
            iface.send(ControlSetup::SET_REPORT, query.as_bytes())?;
            iface.dispose();

            if mouse.model.transport().needs_response_delay() {
                thread::sleep(self.wireless_delay);
            }

            let raw = iface.receive(ControlSetup::GET_REPORT, FRAME_LEN)?;
            iface.dispose();
            raw
        };

        debug!(
            len = raw.len(),
            frame_hex = format_args!("{:02X?}", raw),
            "Message received from the mouse"
        );

        let response = ResponseFrame::decode(&raw)?;
        if !matches!(response.status, ResponseStatus::Successful) {
            debug!(status = ?response.status, "Reply status is not 'successful'");
        }

        Ok(Some(BatteryLevel {
            model: mouse.model,
            raw: response.battery_raw,
        }))
    }

    /// Query the battery, degrading every failure to an unavailable reading.
    pub fn poll(&self) -> BatteryReading {
        match self.read() {
            Ok(Some(level)) => BatteryReading {
                percentage: level.percentage(),
                status: DeviceStatus::Connected(level.model.transport()),
            },
            Ok(None) => BatteryReading::unavailable(DeviceStatus::NotFound),
            Err(e) => {
                warn!(
                    error = %e,
                    class = ?ErrorClass::classify(&e),
                    backend = self.backend.name(),
                    "Battery read failed"
                );
                BatteryReading::unavailable(DeviceStatus::from_error(&e))
            }
        }
    }

    /// Battery percentage in [0, 100]; 0.0 whenever it cannot be read.
    pub fn read_percentage(&self) -> f32 {
        self.poll().percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TransportKind;
    use crate::error::Error;
    use crate::transport::mock::{Call, MockBackend, MockMouse, MockStep};
    use crate::{pids, RAZER_VID};
    use std::time::Instant;

    fn reader_for(mock: MockBackend) -> BatteryReader {
        BatteryReader::new(Box::new(mock)).with_wireless_delay(Duration::ZERO)
    }

    #[test]
    fn scale_endpoints_and_midpoint() {
        assert_eq!(scale_raw(255), 100.0);
        assert_eq!(scale_raw(0), 0.0);
        assert!((scale_raw(128) - 50.196).abs() < 0.001);
    }

    #[test]
    fn no_device_reads_zero() {
        let reader = reader_for(MockBackend::new());
        assert!(reader.read().unwrap().is_none());
        assert_eq!(reader.read_percentage(), 0.0);
        assert_eq!(reader.poll().status, DeviceStatus::NotFound);
    }

    #[test]
    fn wired_read_follows_transfer_sequence() {
        let mock = MockBackend::new();
        mock.attach(RAZER_VID, pids::VIPER_V2_PRO_WIRED, MockMouse::responding(255));
        let log = mock.call_log();
        let reader = reader_for(mock);

        let level = reader.read().unwrap().unwrap();
        assert_eq!(level.raw, 255);
        assert_eq!(level.percentage(), 100.0);

        let query = QueryFrame::battery(DEFAULT_TRANSACTION_ID);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                Call::Open(RAZER_VID, pids::VIPER_V2_PRO_WIRED),
                Call::Claim(BATTERY_INTERFACE),
                Call::Write(ControlSetup::SET_REPORT, query.as_bytes().to_vec()),
                Call::Dispose,
                Call::Read(ControlSetup::GET_REPORT, FRAME_LEN),
                Call::Dispose,
                Call::Release(BATTERY_INTERFACE),
            ]
        );
    }

    #[test]
    fn custom_transaction_id_is_sent() {
        let mock = MockBackend::new();
        mock.attach(RAZER_VID, pids::VIPER_V2_PRO_WIRED, MockMouse::responding(1));
        let log = mock.call_log();
        let reader = reader_for(mock).with_transaction_id(0x3F);
        reader.read().unwrap();

        let calls = log.lock().unwrap();
        let written = calls.iter().find_map(|c| match c {
            Call::Write(_, data) => Some(data.clone()),
            _ => None,
        });
        assert_eq!(written.unwrap()[1], 0x3F);
    }

    #[test]
    fn wireless_read_waits_for_reply() {
        let mock = MockBackend::new();
        mock.attach(
            RAZER_VID,
            pids::VIPER_V2_PRO_WIRELESS,
            MockMouse::responding(128),
        );
        let reader = BatteryReader::new(Box::new(mock)).with_wireless_delay(Duration::from_millis(25));

        let start = Instant::now();
        let reading = reader.poll();
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert!((reading.percentage - 50.196).abs() < 0.001);
        assert_eq!(
            reading.status,
            DeviceStatus::Connected(TransportKind::Wireless)
        );
    }

    #[test]
    fn wired_read_skips_delay() {
        let mock = MockBackend::new();
        mock.attach(RAZER_VID, pids::VIPER_V2_PRO_WIRED, MockMouse::responding(64));
        let reader = BatteryReader::new(Box::new(mock)).with_wireless_delay(Duration::from_secs(5));

        let start = Instant::now();
        reader.read().unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    /// The dongle is 0x00A6 and the cable is 0x00A5; only the dongle waits.
    #[test]
    fn delay_follows_product_id() {
        let delay = Duration::from_millis(300);
        let timed_read = |pid: u16| {
            let mock = MockBackend::new();
            mock.attach(RAZER_VID, pid, MockMouse::responding(90));
            let reader = BatteryReader::new(Box::new(mock)).with_wireless_delay(delay);
            let start = Instant::now();
            let level = reader.read().unwrap().unwrap();
            (level.model.transport(), start.elapsed())
        };

        let (transport, elapsed) = timed_read(0x00A6);
        assert_eq!(transport, TransportKind::Wireless);
        assert!(elapsed >= delay);

        let (transport, elapsed) = timed_read(0x00A5);
        assert_eq!(transport, TransportKind::Wired);
        assert!(elapsed < delay);
    }

    #[test]
    fn failed_read_releases_interface_and_degrades() {
        let mock = MockBackend::new();
        mock.attach(
            RAZER_VID,
            pids::VIPER_V2_PRO_WIRED,
            MockMouse::responding(200)
                .failing_at(MockStep::Read, || Error::Timeout("control IN".into())),
        );
        let log = mock.call_log();
        let reader = reader_for(mock);

        assert!(matches!(reader.read(), Err(Error::Timeout(_))));
        assert_eq!(
            log.lock().unwrap().last(),
            Some(&Call::Release(BATTERY_INTERFACE))
        );

        let reading = reader.poll();
        assert_eq!(reading.percentage, 0.0);
        assert_eq!(reading.status, DeviceStatus::Error);
    }

    #[test]
    fn short_reply_is_malformed() {
        let mock = MockBackend::new();
        mock.attach(
            RAZER_VID,
            pids::VIPER_V2_PRO_WIRED,
            MockMouse::with_response(vec![0x02, 0x1F, 0x00, 0x00]),
        );
        let reader = reader_for(mock);
        assert!(matches!(
            reader.read(),
            Err(Error::MalformedResponse { len: 4, .. })
        ));
        assert_eq!(reader.read_percentage(), 0.0);
    }

    #[test]
    fn permission_failure_surfaces_in_status() {
        let mock = MockBackend::new();
        mock.attach(
            RAZER_VID,
            pids::VIPER_V2_PRO_WIRELESS,
            MockMouse::responding(1)
                .failing_at(MockStep::Open, || Error::PermissionDenied("open".into())),
        );
        let reading = reader_for(mock).poll();
        assert_eq!(reading.status, DeviceStatus::PermissionError);
        assert_eq!(reading.percentage, 0.0);
    }
}
