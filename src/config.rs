//! Configuration types for the updater and the slideshow.

use crate::error::{PotatoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Repository checked for releases when nothing overrides it.
pub const BUILT_IN_UPDATE_REPO: &str = "einord/potential-potato";

/// Environment variable that overrides the release repository.
pub const UPDATE_REPO_ENV: &str = "UPDATE_REPO";

/// Top-level configuration, persisted as `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Self-update settings.
    pub update: UpdateConfig,
    /// Image share location.
    pub share: ShareConfig,
    /// Image refresh settings.
    pub slideshow: SlideshowConfig,
}

/// Which Linux artifact flavour this installation consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxPackaging {
    /// Portable AppImage kept under `~/Applications` behind a stable link.
    AppImage,
    /// Debian package installed through the system package manager.
    Deb,
}

/// Self-update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// `"owner/repo"` to query. `UPDATE_REPO` in the environment wins when
    /// it is well-formed. An empty or malformed value disables updates.
    pub repo: Option<String>,
    /// Base URL of the releases API.
    pub api_base_url: String,
    /// Seconds between scheduled checks.
    pub check_interval_secs: u64,
    /// Number of AppImages kept on disk besides the running one.
    pub keep_appimages: usize,
    /// Seconds counted down before relaunching into a staged AppImage.
    pub restart_countdown_secs: u32,
    /// Total download attempts per artifact.
    pub download_attempts: u32,
    /// Linear backoff unit between download attempts, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Forces the Linux packaging flavour instead of detecting it.
    pub linux_packaging: Option<LinuxPackaging>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo: Some(BUILT_IN_UPDATE_REPO.to_owned()),
            api_base_url: "https://api.github.com".to_owned(),
            check_interval_secs: 60 * 60,
            keep_appimages: 2,
            restart_countdown_secs: 5,
            download_attempts: 3,
            retry_base_delay_ms: 1000,
            linux_packaging: None,
        }
    }
}

impl UpdateConfig {
    /// Resolve the repository to check, honouring `UPDATE_REPO`.
    ///
    /// Returns `None` when updates are disabled. Logs the reason once.
    pub fn resolve_repo(&self) -> Option<UpdateRepo> {
        let env_value = std::env::var(UPDATE_REPO_ENV).ok();
        resolve_repo_from(env_value.as_deref(), self.repo.as_deref())
    }
}

/// Owner and repository of the release feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRepo {
    /// Account or organisation.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl UpdateRepo {
    /// Parse `"owner/repo"`. Both halves must be non-empty.
    pub fn parse(value: &str) -> Option<Self> {
        let (owner, repo) = value.trim().split_once('/')?;
        let repo = repo.split('/').next().unwrap_or_default();
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })
    }
}

impl std::fmt::Display for UpdateRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Pick the env override when well-formed, else the configured value.
pub(crate) fn resolve_repo_from(env: Option<&str>, configured: Option<&str>) -> Option<UpdateRepo> {
    if let Some(parsed) = env.and_then(UpdateRepo::parse) {
        if env != configured {
            tracing::info!("{UPDATE_REPO_ENV} overridden by environment variable");
        }
        return Some(parsed);
    }

    match configured.and_then(UpdateRepo::parse) {
        Some(repo) => Some(repo),
        None => {
            tracing::warn!(
                "updater disabled: set {UPDATE_REPO_ENV} (config or env) to \"owner/repo\" to enable update checks"
            );
            None
        }
    }
}

/// Where the image share is mounted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Mount point of the share (None disables the slideshow).
    pub root: Option<PathBuf>,
    /// Directory inside the share holding images and `settings.json`.
    pub directory: String,
}

/// Image refresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowConfig {
    /// Whether the refresh loop runs at all.
    pub enabled: bool,
    /// Refresh period used until the share provides `refreshRate`.
    pub default_refresh_secs: u64,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_refresh_secs: 10,
        }
    }
}

impl FrameConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PotatoError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PotatoError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location.
    pub fn default_config_path() -> PathBuf {
        crate::potato_dirs::config_file()
    }
}
