//! Desktop colour scheme detection.
//!
//! Each platform keeps the dark/light preference somewhere different:
//!
//! - Linux: the XDG desktop portal, `org.freedesktop.appearance color-scheme`
//!   (0 no preference, 1 dark, 2 light).
//! - Windows: `AppsUseLightTheme` under the current user's `Personalize` key
//!   (0 means dark).
//! - macOS: the `AppleInterfaceStyle` user default, `Dark` when dark.
//!
//! Anything unreadable counts as light.

use tracing::debug;
use viper_battery_core::config::ThemePreference;

/// Where the dark/light decision comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeSource {
    /// Always this answer.
    Fixed(bool),
    /// Ask the desktop on every refresh.
    Desktop,
}

impl ThemeSource {
    pub fn from_preference(preference: ThemePreference) -> Self {
        match preference {
            ThemePreference::Auto => Self::Desktop,
            ThemePreference::Dark => Self::Fixed(true),
            ThemePreference::Light => Self::Fixed(false),
        }
    }

    pub async fn is_dark(&self) -> bool {
        match self {
            Self::Fixed(dark) => *dark,
            Self::Desktop => match platform::prefers_dark().await {
                Ok(dark) => dark,
                Err(e) => {
                    debug!(error = %e, "Colour scheme unavailable; assuming light");
                    false
                }
            },
        }
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use anyhow::Result;
    use zbus::zvariant::OwnedValue;
    use zbus::{proxy, Connection};

    const APPEARANCE_NAMESPACE: &str = "org.freedesktop.appearance";
    const COLOR_SCHEME_KEY: &str = "color-scheme";
    const PREFER_DARK: u32 = 1;

    #[proxy(
        interface = "org.freedesktop.portal.Settings",
        default_service = "org.freedesktop.portal.Desktop",
        default_path = "/org/freedesktop/portal/desktop"
    )]
    trait PortalSettings {
        fn read_one(&self, namespace: &str, key: &str) -> zbus::Result<OwnedValue>;
    }

    pub async fn prefers_dark() -> Result<bool> {
        let connection = Connection::session().await?;
        let proxy = PortalSettingsProxy::new(&connection).await?;
        let value = proxy.read_one(APPEARANCE_NAMESPACE, COLOR_SCHEME_KEY).await?;
        Ok(u32::try_from(value)? == PREFER_DARK)
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use anyhow::Result;
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    const PERSONALIZE_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Themes\Personalize";

    pub async fn prefers_dark() -> Result<bool> {
        let personalize = RegKey::predef(HKEY_CURRENT_USER).open_subkey(PERSONALIZE_KEY)?;
        let light = personalize.get_value::<u32, &str>("AppsUseLightTheme")?;
        Ok(light == 0)
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use anyhow::Result;
    use objc2_foundation::{NSString, NSUserDefaults};

    pub async fn prefers_dark() -> Result<bool> {
        let key = NSString::from_str("AppleInterfaceStyle");
        // Unset in light mode.
        #[allow(unused_unsafe)]
        let style = unsafe { NSUserDefaults::standardUserDefaults().stringForKey(&key) };
        Ok(style.is_some_and(|style| style.to_string() == "Dark"))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
mod platform {
    pub async fn prefers_dark() -> anyhow::Result<bool> {
        Ok(false)
    }
}
