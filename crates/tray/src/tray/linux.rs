//! StatusNotifierItem tray, served over the session bus by `ksni`.

use super::{tooltip_text, TRAY_ID};
use crate::refresh::Snapshot;
use crate::shutdown::Shutdown;
use anyhow::{anyhow, Result};
use image::RgbaImage;
use ksni::menu::StandardItem;
use ksni::{Category, Icon, MenuItem, Status, ToolTip, Tray, TrayMethods};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Shows the latest snapshot until shutdown, swapping it in whenever the
/// refresh loop publishes a new one.
pub async fn handle_tray(
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
    mut stop: Shutdown,
) -> Result<()> {
    let initial = Arc::clone(&snapshots.borrow_and_update());
    let tray = BatteryTray::new(initial, stop.clone());

    let handle = match tray.spawn().await {
        Ok(handle) => handle,
        Err(e) => {
            // Without a tray there is nothing to show, so take the rest down too.
            stop.trigger();
            return Err(anyhow!("Unable to spawn the tray icon: {e}"));
        }
    };

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Refresh loop gone; closing tray");
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                let updated = handle
                    .update(move |tray: &mut BatteryTray| tray.snapshot = snapshot)
                    .await;
                if updated.is_none() {
                    warn!("Tray service stopped unexpectedly");
                    stop.trigger();
                    break;
                }
            }
            () = stop.recv() => break,
        }
    }

    debug!("Shutting down tray handler");
    let _ = handle.shutdown().await;
    Ok(())
}

/// StatusNotifierItem pixmaps are ARGB32 in network byte order.
pub fn rgba_to_argb(image: &RgbaImage) -> Icon {
    let mut data = Vec::with_capacity(image.as_raw().len());
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        data.extend_from_slice(&[a, r, g, b]);
    }

    Icon {
        width: image.width() as i32,
        height: image.height() as i32,
        data,
    }
}

pub struct BatteryTray {
    snapshot: Arc<Snapshot>,
    stop: Shutdown,
}

impl BatteryTray {
    pub fn new(snapshot: Arc<Snapshot>, stop: Shutdown) -> Self {
        Self { snapshot, stop }
    }
}

impl Tray for BatteryTray {
    fn id(&self) -> String {
        TRAY_ID.to_string()
    }

    fn category(&self) -> Category {
        Category::Hardware
    }

    fn title(&self) -> String {
        String::from("Mouse Battery")
    }

    fn status(&self) -> Status {
        Status::Active
    }

    fn icon_pixmap(&self) -> Vec<Icon> {
        vec![rgba_to_argb(&self.snapshot.icon)]
    }

    fn tool_tip(&self) -> ToolTip {
        ToolTip {
            title: tooltip_text(&self.snapshot),
            description: self.snapshot.reading.status.describe().to_string(),
            ..Default::default()
        }
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        vec![
            StandardItem {
                label: self.snapshot.label.clone(),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: String::from("Exit"),
                activate: Box::new(|this: &mut BatteryTray| {
                    debug!("Exit selected");
                    this.stop.trigger();
                }),
                ..Default::default()
            }
            .into(),
        ]
    }
}
