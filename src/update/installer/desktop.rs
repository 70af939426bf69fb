//! macOS and Windows installers, plus the fallback for unsupported hosts.
//!
//! Both desktop platforms hand the artifact to the OS default handler and
//! let the user finish. Windows additionally exits so the setup program can
//! replace the running files.

use crate::error::{PotatoError, Result};
use crate::update::checker::ReleaseAsset;
use crate::update::installer::{InstallOutcome, PlatformInstaller};
use crate::update::platform::{Arch, Platform};
use crate::update::selector::{AssetTarget, select_asset};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Delay before exiting in favour of the Windows installer.
const WINDOWS_HANDOFF: Duration = Duration::from_secs(2);

/// Opens a path with an external program.
pub type OpenFn = fn(&Path) -> std::io::Result<()>;

/// Open with the OS default handler.
pub fn open_with_default(path: &Path) -> std::io::Result<()> {
    open::that(path)
}

/// Select the file in Finder.
pub fn reveal_in_finder(path: &Path) -> std::io::Result<()> {
    let status = std::process::Command::new("open")
        .arg("-R")
        .arg(path)
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("open -R exited with {status}")))
    }
}

/// Openers only start a short-lived helper process, so they run inline on
/// the runtime thread.
fn run_opener(opener: OpenFn, path: &Path) -> std::io::Result<()> {
    opener(path)
}

/// macOS: open the disk image, or reveal it when opening fails.
#[derive(Debug, Clone)]
pub struct MacOsInstaller {
    platform: Platform,
    arch: Arch,
    download_dir: PathBuf,
    opener: OpenFn,
    revealer: OpenFn,
}

impl MacOsInstaller {
    /// Installer saving artifacts to `download_dir`.
    pub fn new(arch: Arch, download_dir: PathBuf) -> Self {
        Self {
            platform: Platform::MacOs,
            arch,
            download_dir,
            opener: open_with_default,
            revealer: reveal_in_finder,
        }
    }

    /// Replace the open and reveal actions.
    pub fn with_openers(mut self, opener: OpenFn, revealer: OpenFn) -> Self {
        self.opener = opener;
        self.revealer = revealer;
        self
    }
}

#[async_trait]
impl PlatformInstaller for MacOsInstaller {
    fn platform(&self) -> &Platform {
        &self.platform
    }

    fn arch(&self) -> &Arch {
        &self.arch
    }

    fn select_asset<'a>(&self, assets: &'a [ReleaseAsset]) -> Option<&'a ReleaseAsset> {
        select_asset(assets, AssetTarget::MacOs, &self.arch)
    }

    fn target_dir(&self, _asset: &ReleaseAsset) -> PathBuf {
        self.download_dir.clone()
    }

    async fn install(&self, artifact: &Path) -> Result<InstallOutcome> {
        match run_opener(self.opener, artifact) {
            Ok(()) => info!("opened {}", artifact.display()),
            Err(e) => {
                warn!("cannot open {}, revealing instead: {e}", artifact.display());
                run_opener(self.revealer, artifact).map_err(|e| {
                    PotatoError::Install(format!(
                        "cannot open or reveal {}: {e}",
                        artifact.display()
                    ))
                })?;
            }
        }
        Ok(InstallOutcome::AwaitUser)
    }
}

/// Windows: launch the setup program, then exit.
#[derive(Debug, Clone)]
pub struct WindowsInstaller {
    platform: Platform,
    arch: Arch,
    download_dir: PathBuf,
    opener: OpenFn,
}

impl WindowsInstaller {
    /// Installer saving artifacts to `download_dir`.
    pub fn new(arch: Arch, download_dir: PathBuf) -> Self {
        Self {
            platform: Platform::Windows,
            arch,
            download_dir,
            opener: open_with_default,
        }
    }

    /// Replace the open action.
    pub fn with_opener(mut self, opener: OpenFn) -> Self {
        self.opener = opener;
        self
    }
}

#[async_trait]
impl PlatformInstaller for WindowsInstaller {
    fn platform(&self) -> &Platform {
        &self.platform
    }

    fn arch(&self) -> &Arch {
        &self.arch
    }

    fn select_asset<'a>(&self, assets: &'a [ReleaseAsset]) -> Option<&'a ReleaseAsset> {
        select_asset(assets, AssetTarget::Windows, &self.arch)
    }

    fn target_dir(&self, _asset: &ReleaseAsset) -> PathBuf {
        self.download_dir.clone()
    }

    async fn install(&self, artifact: &Path) -> Result<InstallOutcome> {
        run_opener(self.opener, artifact).map_err(|e| {
            PotatoError::Install(format!("cannot start installer {}: {e}", artifact.display()))
        })?;
        info!("installer started: {}", artifact.display());
        Ok(InstallOutcome::Exit {
            after: WINDOWS_HANDOFF,
        })
    }
}

/// Hosts without an update path. Never selects an asset.
#[derive(Debug, Clone)]
pub struct UnsupportedInstaller {
    platform: Platform,
    arch: Arch,
}

impl UnsupportedInstaller {
    /// Placeholder for `platform`/`arch`.
    pub fn new(platform: Platform, arch: Arch) -> Self {
        Self { platform, arch }
    }
}

#[async_trait]
impl PlatformInstaller for UnsupportedInstaller {
    fn platform(&self) -> &Platform {
        &self.platform
    }

    fn arch(&self) -> &Arch {
        &self.arch
    }

    fn select_asset<'a>(&self, _assets: &'a [ReleaseAsset]) -> Option<&'a ReleaseAsset> {
        None
    }

    fn target_dir(&self, _asset: &ReleaseAsset) -> PathBuf {
        crate::potato_dirs::downloads_dir()
    }

    async fn install(&self, _artifact: &Path) -> Result<InstallOutcome> {
        Err(PotatoError::Install(format!(
            "updates are not supported on {}/{}",
            self.platform, self.arch
        )))
    }
}
