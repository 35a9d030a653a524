//! Read-only user settings.
//!
//! Settings live in a JSON file under the user config directory. The file is
//! optional and never written; command-line flags override it.

use crate::error::{Error, Result};
use crate::transport::{BackendKind, DEFAULT_TRANSFER_TIMEOUT};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const APP_DIR: &str = "viper-battery";
const SETTINGS_FILE: &str = "settings.json";

/// Which colour scheme the icon is drawn for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    /// Follow the desktop.
    #[default]
    Auto,
    Dark,
    Light,
}

impl FromStr for ThemePreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "system" => Ok(Self::Auto),
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!(
                "unknown theme '{other}' (expected 'auto', 'dark' or 'light')"
            )),
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Dark => write!(f, "dark"),
            Self::Light => write!(f, "light"),
        }
    }
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// USB stack used to reach the mouse.
    pub backend: BackendKind,
    /// Icon colour scheme.
    pub theme: ThemePreference,
    /// Replacement "empty" outline image.
    pub empty_icon: Option<PathBuf>,
    /// Replacement "full" fill mask image.
    pub full_icon: Option<PathBuf>,
    /// Per-transfer timeout for the libusb backend, in milliseconds.
    pub transfer_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            theme: ThemePreference::default(),
            empty_icon: None,
            full_icon: None,
            transfer_timeout_ms: DEFAULT_TRANSFER_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Settings {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    /// Both custom icon paths, if both are set.
    pub fn icon_paths(&self) -> Result<Option<(&Path, &Path)>> {
        match (&self.empty_icon, &self.full_icon) {
            (Some(empty), Some(full)) => Ok(Some((empty.as_path(), full.as_path()))),
            (None, None) => Ok(None),
            _ => Err(Error::Config(
                "empty_icon and full_icon must be set together".to_string(),
            )),
        }
    }
}

/// Default settings file location, inside the per-user config directory.
pub fn settings_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", APP_DIR)
        .ok_or_else(|| Error::Config("no home directory to hold settings".to_string()))?;
    Ok(dirs.config_dir().join(SETTINGS_FILE))
}

/// Parse settings from JSON text.
pub fn parse_settings(text: &str) -> Result<Settings> {
    let settings: Settings =
        serde_json::from_str(text).map_err(|e| Error::Config(format!("invalid settings: {e}")))?;
    if settings.transfer_timeout_ms == 0 {
        return Err(Error::Config(
            "transfer_timeout_ms must be greater than zero".to_string(),
        ));
    }
    settings.icon_paths()?;
    Ok(settings)
}

/// Load settings.
///
/// An explicit `path` must exist. Without one, the default location is used
/// and a missing file yields defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match settings_path() {
            Ok(p) => (p, false),
            Err(e) => {
                debug!(error = %e, "No settings location; using defaults");
                return Ok(Settings::default());
            }
        },
    };

    if !required && !path.exists() {
        debug!(path = %path.display(), "No settings file; using defaults");
        return Ok(Settings::default());
    }

    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    let settings = parse_settings(&text)?;
    debug!(path = %path.display(), ?settings, "Loaded settings");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let settings = parse_settings("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.transfer_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn parses_all_fields() {
        let settings = parse_settings(
            r#"{
                "backend": "hidapi",
                "theme": "dark",
                "empty_icon": "/tmp/empty.png",
                "full_icon": "/tmp/full.png",
                "transfer_timeout_ms": 2500
            }"#,
        )
        .unwrap();
        assert_eq!(settings.backend, BackendKind::Hidapi);
        assert_eq!(settings.theme, ThemePreference::Dark);
        assert_eq!(
            settings.icon_paths().unwrap(),
            Some((Path::new("/tmp/empty.png"), Path::new("/tmp/full.png")))
        );
        assert_eq!(settings.transfer_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(parse_settings(r#"{"poll_interval_secs": 5}"#).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(parse_settings(r#"{"transfer_timeout_ms": 0}"#).is_err());
    }

    #[test]
    fn rejects_half_configured_icons() {
        let result = parse_settings(r#"{"empty_icon": "/tmp/empty.png"}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let missing = Path::new("/nonexistent/viper-battery/settings.json");
        assert!(load_settings(Some(missing)).is_err());
    }

    #[test]
    fn theme_preference_parses_names() {
        assert_eq!("Dark".parse::<ThemePreference>(), Ok(ThemePreference::Dark));
        assert_eq!("system".parse::<ThemePreference>(), Ok(ThemePreference::Auto));
        assert!("sepia".parse::<ThemePreference>().is_err());
        assert_eq!(ThemePreference::Light.to_string(), "light");
    }

    #[test]
    fn settings_path_uses_platform_config_dir() {
        let Some(dirs) = ProjectDirs::from("", "", "viper-battery") else {
            assert!(matches!(settings_path(), Err(Error::Config(_))));
            return;
        };
        let path = settings_path().unwrap();
        assert_eq!(path, dirs.config_dir().join("settings.json"));
        assert!(path.components().any(|c| c.as_os_str() == "viper-battery"));
        assert_eq!(path.file_name().unwrap(), "settings.json");
    }
}
