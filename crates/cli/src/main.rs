//! viper-battery CLI: one-shot battery reads and icon rendering.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use viper_battery_core::battery::BatteryReader;
use viper_battery_core::config::{self, Settings};
use viper_battery_core::icon::{self, IconAssets};
use viper_battery_core::transport::{self, BackendKind, UsbBackend};

#[derive(Parser)]
#[command(
    name = "viper-battery",
    version,
    about = "Read the battery level of a Razer Viper V2 Pro"
)]
struct Cli {
    /// USB backend: libusb or hidapi. Overrides the settings file.
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Settings file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected supported mice.
    ListDevices,
    /// Read the battery level once.
    Battery {
        /// Print the raw 0-255 byte instead of a percentage.
        #[arg(long)]
        raw: bool,
        /// Print the reading as JSON.
        #[arg(long, conflicts_with = "raw")]
        json: bool,
    },
    /// Render the tray icon for a percentage to a PNG file.
    Render {
        /// Battery percentage (0-100).
        percentage: f32,
        /// Output PNG path.
        output: PathBuf,
        /// Draw for a dark desktop theme.
        #[arg(long)]
        dark: bool,
    },
}

/// Settings file merged with the global flags.
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        debug!(%backend, "Backend chosen on the command line");
        settings.backend = backend;
    }
    debug!(?settings, "Effective settings");
    Ok(settings)
}

fn open_backend(settings: &Settings) -> Result<Box<dyn UsbBackend>> {
    transport::open_backend(settings.backend, settings.transfer_timeout())
        .with_context(|| format!("initialise {} backend", settings.backend))
}

fn load_assets(settings: &Settings) -> Result<IconAssets> {
    let assets = match settings.icon_paths()? {
        Some((empty, full)) => IconAssets::load(empty, full)?,
        None => IconAssets::builtin()?,
    };
    Ok(assets)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    match cli.command {
        Commands::ListDevices => {
            let backend = open_backend(&settings)?;
            let devices = viper_battery_core::device::discover_devices(backend.as_ref())?;
            debug!(backend = backend.name(), count = devices.len(), "Enumerated mice");
            if devices.is_empty() {
                println!("No supported Razer mice found.");
                println!("Ensure your mouse or dongle is connected and udev rules are set up.");
            } else {
                for dev in &devices {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, {})",
                        dev.model.name(),
                        dev.vid,
                        dev.pid,
                        dev.transport
                    );
                }
            }
        }
        Commands::Battery { raw, json } => {
            let reader = BatteryReader::new(open_backend(&settings)?);
            debug!(backend = reader.backend_name(), raw, json, "Reading battery");
            if json {
                let reading = reader.poll();
                println!("{}", serde_json::to_string_pretty(&reading)?);
                return Ok(());
            }

            match reader.read()? {
                Some(level) if raw => println!("{}", level.raw),
                Some(level) => println!(
                    "{}: {:.0}%",
                    level.model.name(),
                    level.percentage()
                ),
                None => {
                    println!("Mouse Battery: 0%");
                    println!("No supported Razer mouse found.");
                }
            }
        }
        Commands::Render {
            percentage,
            output,
            dark,
        } => {
            anyhow::ensure!(
                (0.0..=100.0).contains(&percentage),
                "percentage must be between 0 and 100, got {percentage}"
            );
            let assets = load_assets(&settings)?;
            let image = icon::compose(percentage, &assets, dark);
            debug!(percentage, dark, output = %output.display(), "Saving icon");
            image
                .save(&output)
                .with_context(|| format!("write {}", output.display()))?;
            println!(
                "Rendered {}x{} icon for {percentage}% to {}",
                image.width(),
                image.height(),
                output.display()
            );
        }
    }

    Ok(())
}
