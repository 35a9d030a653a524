//! Error classification and device status for display.
//!
//! A failed poll never propagates out of the refresh cycle; instead the error
//! is classified so the tray can say why the battery is unknown.

use crate::device::TransportKind;
use crate::error::Error;
use serde::Serialize;
use std::fmt;

/// Classification of communication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout or busy device; the next poll may succeed.
    Transient,
    /// Device went away mid-poll.
    Disconnected,
    /// OS refused access (udev rules, exclusive driver).
    PermissionDenied,
    /// Short or garbled response.
    InvalidResponse,
    /// Anything else from the USB stack.
    Transport,
}

impl ErrorClass {
    /// Classify an error for display and logging.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::Timeout(_) => Self::Transient,
            Error::PermissionDenied(_) => Self::PermissionDenied,
            Error::DeviceNotFound(_) => Self::Disconnected,
            Error::MalformedResponse { .. } => Self::InvalidResponse,
            Error::Usb(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("disconnect")
                    || lower.contains("not found")
                    || lower.contains("no such device")
                {
                    Self::Disconnected
                } else if lower.contains("permission")
                    || lower.contains("access denied")
                    || lower.contains("access is denied")
                {
                    Self::PermissionDenied
                } else if lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("busy")
                {
                    Self::Transient
                } else {
                    Self::Transport
                }
            }
            Error::Unsupported(_) | Error::Asset(_) | Error::Config(_) => Self::Transport,
        }
    }
}

/// Device connection status for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Battery read succeeded over the given transport.
    Connected(TransportKind),
    /// No supported mouse attached.
    NotFound,
    /// Mouse disappeared during the poll.
    Disconnected,
    /// Permission denied; needs udev rules or driver setup.
    PermissionError,
    /// Transfer failed or the reply was unusable.
    Error,
}

impl DeviceStatus {
    /// Status to show after a failed poll.
    pub fn from_error(err: &Error) -> Self {
        match ErrorClass::classify(err) {
            ErrorClass::Disconnected => Self::Disconnected,
            ErrorClass::PermissionDenied => Self::PermissionError,
            ErrorClass::Transient | ErrorClass::InvalidResponse | ErrorClass::Transport => {
                Self::Error
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// One-line description for tooltips.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Connected(TransportKind::Wireless) => "Connected (wireless)",
            Self::Connected(TransportKind::Wired) => "Connected (wired)",
            Self::NotFound => "No mouse found",
            Self::Disconnected => "Mouse disconnected",
            Self::PermissionError => "Permission denied; check udev rules",
            Self::Error => "Battery read failed",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
