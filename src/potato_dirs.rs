//! Centralized filesystem paths for the photo frame host.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/potential-potato/` | `~/.local/share/potential-potato/` |
//! | Config | `~/Library/Application Support/potential-potato/` | `~/.config/potential-potato/` |
//! | AppImages | n/a | `~/Applications/` |
//! | Stable link | n/a | `~/.local/bin/potential-potato` |
//! | Autostart | n/a | `~/.config/autostart/potential-potato.desktop` |
//!
//! # Environment Overrides
//!
//! - `POTATO_DATA_DIR`: overrides [`data_dir`]
//! - `POTATO_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application identifier used for directory and file names.
pub const APP_ID: &str = "potential-potato";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Application data root directory.
///
/// Resolves to `dirs::data_dir()/potential-potato/` by default. Override with
/// the `POTATO_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("POTATO_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_ID))
        .unwrap_or_else(|| PathBuf::from("/tmp/potential-potato-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/potential-potato/` by default. Override
/// with the `POTATO_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("POTATO_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_ID))
        .unwrap_or_else(|| PathBuf::from("/tmp/potential-potato-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Where installers and archives are saved for the user to open.
#[must_use]
pub fn downloads_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| home_dir().join("Downloads"))
}

/// Directory holding versioned AppImage files (`~/Applications`).
#[must_use]
pub fn linux_apps_dir() -> PathBuf {
    home_dir().join("Applications")
}

/// Stable launch link pointing at the newest validated AppImage.
#[must_use]
pub fn linux_bin_link() -> PathBuf {
    home_dir().join(".local").join("bin").join(APP_ID)
}

/// Login autostart descriptor (`~/.config/autostart/potential-potato.desktop`).
#[must_use]
pub fn linux_autostart_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| home_dir().join(".config"))
        .join("autostart")
        .join(format!("{APP_ID}.desktop"))
}
