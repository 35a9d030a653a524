//! viper-battery-tray: a tray icon that fills up with the mouse battery level.

mod refresh;
mod shutdown;
mod theme;
mod tray;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use viper_battery_core::battery::{BatteryReader, BatteryReading};
use viper_battery_core::comm::DeviceStatus;
use viper_battery_core::config::{self, Settings, ThemePreference};
use viper_battery_core::icon::IconAssets;
use viper_battery_core::transport::{self, BackendKind};

use crate::refresh::{AssetRenderer, IconRenderer, RefreshLoop, Snapshot};
use crate::shutdown::Shutdown;
use crate::theme::ThemeSource;

#[derive(Parser)]
#[command(
    name = "viper-battery-tray",
    version,
    about = "Show the Razer Viper V2 Pro battery level in the system tray"
)]
struct Cli {
    /// USB backend: libusb or hidapi.
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Icon theme: auto, dark or light.
    #[arg(long)]
    theme: Option<ThemePreference>,

    /// PNG drawn for an empty battery. Requires --full-icon.
    #[arg(long, requires = "full_icon")]
    empty_icon: Option<PathBuf>,

    /// PNG drawn for a full battery. Requires --empty-icon.
    #[arg(long, requires = "empty_icon")]
    full_icon: Option<PathBuf>,

    /// Settings file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Command-line flags win over the settings file.
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(backend) = self.backend {
            settings.backend = backend;
        }
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let (Some(empty), Some(full)) = (&self.empty_icon, &self.full_icon) {
            settings.empty_icon = Some(empty.clone());
            settings.full_icon = Some(full.clone());
        }
        settings
    }
}

fn load_assets(settings: &Settings) -> Result<IconAssets> {
    let assets = match settings.icon_paths()? {
        Some((empty, full)) => IconAssets::load(empty, full)
            .with_context(|| format!("load icons {} and {}", empty.display(), full.display()))?,
        None => IconAssets::builtin()?,
    };
    Ok(assets)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.apply(config::load_settings(cli.config.as_deref())?);

    let assets = load_assets(&settings)?;
    let backend = transport::open_backend(settings.backend, settings.transfer_timeout())
        .with_context(|| format!("initialise {} backend", settings.backend))?;
    let reader = BatteryReader::new(backend);
    info!(
        backend = reader.backend_name(),
        theme = %settings.theme,
        "Starting battery tray"
    );

    let renderer = Arc::new(AssetRenderer::new(assets));
    let theme = ThemeSource::from_preference(settings.theme);

    // Shown until the first cycle lands.
    let placeholder = Snapshot::new(
        BatteryReading::unavailable(DeviceStatus::NotFound),
        renderer.render(0.0, theme.is_dark().await),
    );
    let (tx, rx) = watch::channel(Arc::new(placeholder));

    let shutdown = Shutdown::new();
    tokio::spawn(await_ctrl_c(shutdown.clone()));

    let refresh = tokio::spawn(RefreshLoop::new(reader, renderer, theme).run(tx, shutdown.clone()));

    // Blocks the main thread on Windows and macOS, where the tray's event
    // loop has to live. Returns once Exit or Ctrl+C fires the shutdown.
    let tray_result = tray::handle_tray(rx, shutdown.clone()).await;
    shutdown.trigger();
    info!("Shutting down");

    let cycles = refresh.await??;
    info!(cycles, "Refresh loop stopped");

    tray_result
}

async fn await_ctrl_c(shutdown: Shutdown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Ctrl+C received");
            shutdown.trigger();
        }
        Err(e) => error!("Unable to listen for Ctrl+C: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from([
            "viper-battery-tray",
            "--backend",
            "hidapi",
            "--theme",
            "dark",
            "--empty-icon",
            "/tmp/e.png",
            "--full-icon",
            "/tmp/f.png",
        ])
        .unwrap();
        let settings = cli.apply(Settings::default());
        assert_eq!(settings.backend, BackendKind::Hidapi);
        assert_eq!(settings.theme, ThemePreference::Dark);
        assert_eq!(settings.empty_icon, Some(PathBuf::from("/tmp/e.png")));
        assert_eq!(settings.full_icon, Some(PathBuf::from("/tmp/f.png")));
    }

    #[test]
    fn settings_survive_without_flags() {
        let cli = Cli::try_parse_from(["viper-battery-tray"]).unwrap();
        let base = Settings {
            theme: ThemePreference::Light,
            ..Settings::default()
        };
        let settings = cli.apply(base.clone());
        assert_eq!(settings.theme, ThemePreference::Light);
        assert_eq!(settings.backend, base.backend);
    }

    #[test]
    fn icons_come_in_pairs() {
        assert!(Cli::try_parse_from(["viper-battery-tray", "--empty-icon", "/tmp/e.png"]).is_err());
    }

    #[test]
    fn builtin_assets_without_paths() {
        assert!(load_assets(&Settings::default()).is_ok());
    }
}
