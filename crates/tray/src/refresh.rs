//! The once-a-minute poll → render → publish cycle.
//!
//! Each cycle reads the battery and composes the icon on the blocking pool,
//! then publishes an immutable [`Snapshot`] on a watch channel for the tray
//! to pick up. The loop owns its battery source outright, so polls never
//! overlap.

use anyhow::Result;
use chrono::Local;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task;
use tracing::{debug, info};
use viper_battery_core::battery::{BatteryReader, BatteryReading};
use viper_battery_core::icon::{self, IconAssets};

use crate::shutdown::Shutdown;
use crate::theme::ThemeSource;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

const TIMESTAMP_FORMAT: &str = "%I:%M%p on %B %d, %Y";

/// Something that yields one battery reading per call.
pub trait BatterySource: Send + 'static {
    fn poll(&mut self) -> BatteryReading;
}

impl BatterySource for BatteryReader {
    fn poll(&mut self) -> BatteryReading {
        BatteryReader::poll(self)
    }
}

/// Turns a percentage into the tray image.
pub trait IconRenderer: Send + Sync + 'static {
    fn render(&self, percentage: f32, dark: bool) -> RgbaImage;
}

/// Renders from a loaded empty/full image pair.
pub struct AssetRenderer {
    assets: IconAssets,
}

impl AssetRenderer {
    pub fn new(assets: IconAssets) -> Self {
        Self { assets }
    }
}

impl IconRenderer for AssetRenderer {
    fn render(&self, percentage: f32, dark: bool) -> RgbaImage {
        icon::compose(percentage, &self.assets, dark)
    }
}

/// Text of the disabled first menu entry. Fractions are dropped, not rounded.
pub fn menu_label(percentage: f32) -> String {
    format!("Mouse Battery: {}%", percentage as u8)
}

/// Everything the tray shows after one cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub reading: BatteryReading,
    pub icon: RgbaImage,
    pub label: String,
}

impl Snapshot {
    pub fn new(reading: BatteryReading, icon: RgbaImage) -> Self {
        Self {
            label: menu_label(reading.percentage),
            reading,
            icon,
        }
    }
}

pub struct RefreshLoop<S, R> {
    source: S,
    renderer: Arc<R>,
    theme: ThemeSource,
}

impl<S: BatterySource, R: IconRenderer> RefreshLoop<S, R> {
    pub fn new(source: S, renderer: Arc<R>, theme: ThemeSource) -> Self {
        Self {
            source,
            renderer,
            theme,
        }
    }

    /// Runs cycles until shutdown or until nobody is listening. Returns the
    /// number of completed cycles.
    pub async fn run(
        self,
        snapshots: watch::Sender<Arc<Snapshot>>,
        mut shutdown: Shutdown,
    ) -> Result<u64> {
        let Self {
            mut source,
            renderer,
            theme,
        } = self;
        let mut cycles = 0u64;

        loop {
            let dark = theme.is_dark().await;
            let renderer = Arc::clone(&renderer);
            let (returned, snapshot) = task::spawn_blocking(move || {
                let reading = source.poll();
                let icon = renderer.render(reading.percentage, dark);
                (source, Snapshot::new(reading, icon))
            })
            .await?;
            source = returned;
            cycles += 1;

            info!(
                percentage = snapshot.reading.percentage,
                status = %snapshot.reading.status,
                dark,
                "Updating {}",
                Local::now().format(TIMESTAMP_FORMAT)
            );

            if snapshots.send(Arc::new(snapshot)).is_err() {
                debug!("Tray gone; stopping refresh loop");
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(REFRESH_INTERVAL) => {}
                () = shutdown.recv() => {
                    debug!("Refresh loop received shutdown");
                    break;
                }
            }
        }

        Ok(cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;
    use viper_battery_core::comm::DeviceStatus;
    use viper_battery_core::device::TransportKind;

    struct CountingSource {
        polls: Arc<AtomicUsize>,
        reading: BatteryReading,
    }

    impl BatterySource for CountingSource {
        fn poll(&mut self) -> BatteryReading {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.reading
        }
    }

    #[derive(Default)]
    struct CountingRenderer {
        renders: AtomicUsize,
    }

    impl IconRenderer for CountingRenderer {
        fn render(&self, percentage: f32, dark: bool) -> RgbaImage {
            self.renders.fetch_add(1, Ordering::SeqCst);
            let shade = if dark { 200 } else { percentage as u8 };
            RgbaImage::from_pixel(2, 2, Rgba([shade, 0, 0, 255]))
        }
    }

    fn connected(percentage: f32) -> BatteryReading {
        BatteryReading {
            percentage,
            status: DeviceStatus::Connected(TransportKind::Wireless),
        }
    }

    fn placeholder() -> Arc<Snapshot> {
        Arc::new(Snapshot::new(
            BatteryReading::unavailable(DeviceStatus::NotFound),
            RgbaImage::new(2, 2),
        ))
    }

    #[test]
    fn label_truncates() {
        assert_eq!(menu_label(0.0), "Mouse Battery: 0%");
        assert_eq!(menu_label(79.99), "Mouse Battery: 79%");
        assert_eq!(menu_label(100.0), "Mouse Battery: 100%");
    }

    #[test]
    fn asset_renderer_composes() {
        let assets = IconAssets::builtin().unwrap();
        let expected = icon::compose(40.0, &assets, true);
        let renderer = AssetRenderer::new(assets);
        assert_eq!(renderer.render(40.0, true), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn one_poll_and_render_per_interval() {
        const CYCLES: usize = 4;
        let polls = Arc::new(AtomicUsize::new(0));
        let renderer = Arc::new(CountingRenderer::default());
        let source = CountingSource {
            polls: Arc::clone(&polls),
            reading: connected(62.5),
        };
        let (tx, mut rx) = watch::channel(placeholder());
        let shutdown = Shutdown::new();
        let refresh = RefreshLoop::new(source, Arc::clone(&renderer), ThemeSource::Fixed(false));
        let handle = tokio::spawn(refresh.run(tx, shutdown.clone()));

        let mut stamps = Vec::new();
        for _ in 0..CYCLES {
            rx.changed().await.unwrap();
            stamps.push(Instant::now());
            let snapshot = rx.borrow_and_update().clone();
            assert_eq!(snapshot.label, "Mouse Battery: 62%");
            assert_eq!(snapshot.reading, connected(62.5));
            assert_eq!(*snapshot.icon.get_pixel(0, 0), Rgba([62, 0, 0, 255]));
        }

        shutdown.trigger();
        let cycles = handle.await.unwrap().unwrap();
        assert_eq!(cycles, CYCLES as u64);
        assert_eq!(polls.load(Ordering::SeqCst), CYCLES);
        assert_eq!(renderer.renders.load(Ordering::SeqCst), CYCLES);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= REFRESH_INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_still_publishes() {
        let source = CountingSource {
            polls: Arc::new(AtomicUsize::new(0)),
            reading: BatteryReading::unavailable(DeviceStatus::Disconnected),
        };
        let (tx, mut rx) = watch::channel(placeholder());
        let shutdown = Shutdown::new();
        let refresh = RefreshLoop::new(
            source,
            Arc::new(CountingRenderer::default()),
            ThemeSource::Fixed(true),
        );
        let handle = tokio::spawn(refresh.run(tx, shutdown.clone()));

        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.label, "Mouse Battery: 0%");
        assert_eq!(snapshot.reading.status, DeviceStatus::Disconnected);
        assert_eq!(*snapshot.icon.get_pixel(0, 0), Rgba([200, 0, 0, 255]));

        shutdown.trigger();
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_receiver_dropped() {
        let polls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            polls: Arc::clone(&polls),
            reading: connected(10.0),
        };
        let (tx, rx) = watch::channel(placeholder());
        drop(rx);
        let refresh = RefreshLoop::new(
            source,
            Arc::new(CountingRenderer::default()),
            ThemeSource::Fixed(false),
        );
        let cycles = refresh.run(tx, Shutdown::new()).await.unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }
}
