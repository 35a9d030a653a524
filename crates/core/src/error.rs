//! Error types for viper-battery-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// USB control transfer failure.
    #[error("USB error: {0}")]
    Usb(String),

    /// Device vanished between enumeration and open.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Response frame too short to hold the battery byte.
    #[error("malformed response: got {len} bytes, need at least {expected}")]
    MalformedResponse { len: usize, expected: usize },

    /// The backend cannot express the requested control transfer.
    #[error("unsupported by backend: {0}")]
    Unsupported(String),

    /// Icon asset could not be loaded or is unusable.
    #[error("icon asset error: {0}")]
    Asset(String),

    /// Settings file unreadable or invalid.
    #[error("settings error: {0}")]
    Config(String),

    /// Permission denied (missing udev rule or driver holds the device).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Transfer timed out.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
