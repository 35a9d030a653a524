//! Tray surface for the battery snapshot.
//!
//! Linux talks StatusNotifierItem over D-Bus through `ksni`. Windows and
//! macOS use `tray-icon` driven by a `tao` event loop, which has to own the
//! main thread. Elsewhere no tray is shown and the process just waits for
//! shutdown.

use crate::refresh::Snapshot;
use crate::shutdown::Shutdown;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(any(target_os = "windows", target_os = "macos"))]
mod tray_icon;

pub const TRAY_ID: &str = "viper-battery";

/// Tooltip line. The device status is only spelled out when the last read
/// did not reach the mouse.
pub fn tooltip_text(snapshot: &Snapshot) -> String {
    let status = snapshot.reading.status;
    if status.is_connected() {
        snapshot.label.clone()
    } else {
        format!("{} ({})", snapshot.label, status.describe())
    }
}

/// Shows the latest snapshot until shutdown. Must be awaited from the main
/// task: on Windows and macOS the event loop blocks the calling thread.
pub async fn handle_tray(snapshots: watch::Receiver<Arc<Snapshot>>, stop: Shutdown) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        linux::handle_tray(snapshots, stop).await
    }

    #[cfg(any(target_os = "windows", target_os = "macos"))]
    {
        tray_icon::handle_tray(snapshots, stop).await
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        let mut stop = stop;
        drop(snapshots);
        tracing::warn!("No tray support on this platform; running headless");
        stop.recv().await;
        Ok(())
    }
}
