//! Platform installers.
//!
//! Each supported host gets one [`PlatformInstaller`] chosen at startup by
//! [`for_host`]. The updater only talks to the trait: asset selection,
//! download placement, housekeeping around the download, installation, and
//! the relaunch target all live behind it.

pub mod appimage;
pub mod deb;
pub mod desktop;

use crate::config::{LinuxPackaging, UpdateConfig};
use crate::error::{PotatoError, Result};
use crate::update::checker::ReleaseAsset;
use crate::update::platform::{Arch, Platform};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use appimage::{AppImageFile, AppImageInstaller, AppImageLayout};
pub use deb::DebInstaller;
pub use desktop::{MacOsInstaller, UnsupportedInstaller, WindowsInstaller};

/// What the updater does once an artifact is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Run the restart countdown, then relaunch into the launch target.
    Restart,
    /// Exit the process after `after`, handing over to the installed package
    /// or the external installer.
    Exit {
        /// Grace period so the UI can show completion.
        after: Duration,
    },
    /// The user finishes the installation; keep running.
    AwaitUser,
}

/// Per-platform capability used by the updater.
#[async_trait]
pub trait PlatformInstaller: Send + Sync {
    /// Host operating system.
    fn platform(&self) -> &Platform;

    /// Host CPU architecture.
    fn arch(&self) -> &Arch;

    /// Pick the installable artifact from a release.
    fn select_asset<'a>(&self, assets: &'a [ReleaseAsset]) -> Option<&'a ReleaseAsset>;

    /// Directory the artifact is downloaded into.
    fn target_dir(&self, asset: &ReleaseAsset) -> PathBuf;

    /// Startup housekeeping. Failures are logged by the caller and never
    /// block update checks.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Called right before the download starts.
    async fn before_download(&self, _target: &Path) {}

    /// Called after the download finished, before [`Self::install`].
    async fn after_download(&self, _artifact: &Path) {}

    /// Turn a downloaded artifact into an installed state.
    async fn install(&self, artifact: &Path) -> Result<InstallOutcome>;

    /// Executable to relaunch into once the restart countdown reaches zero.
    fn launch_target(&self, pending: &Path) -> Result<PathBuf> {
        if pending.exists() {
            Ok(pending.to_path_buf())
        } else {
            Err(PotatoError::Install(
                "new version could not be started (file missing)".to_owned(),
            ))
        }
    }
}

/// Process restart capability.
pub trait Relauncher: Send + Sync {
    /// Start `target` detached from this process.
    fn relaunch(&self, target: &Path) -> Result<()>;

    /// Terminate this process.
    fn exit(&self, code: i32);
}

/// Real process control: detached spawn and `std::process::exit`.
///
/// `exit` skips destructors, so the relauncher can own the log writer's
/// guard and flush it before the process ends.
#[derive(Debug, Default)]
pub struct SystemRelauncher {
    log_guard: std::sync::Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>,
}

impl SystemRelauncher {
    /// Flush and release `guard` before exiting.
    pub fn with_log_guard(guard: tracing_appender::non_blocking::WorkerGuard) -> Self {
        Self {
            log_guard: std::sync::Mutex::new(Some(guard)),
        }
    }

    /// Drop the log guard, writing out buffered lines. Later log lines only
    /// reach the other layers.
    pub fn flush_logs(&self) {
        drop(
            self.log_guard
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );
    }
}

impl Relauncher for SystemRelauncher {
    fn relaunch(&self, target: &Path) -> Result<()> {
        let mut command = std::process::Command::new(target);
        command
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().map_err(|e| {
            PotatoError::Install(format!(
                "new version could not be started: {}: {e}",
                target.display()
            ))
        })?;
        tracing::info!("relaunched {}", target.display());
        Ok(())
    }

    fn exit(&self, code: i32) {
        tracing::info!(code, "exiting for update");
        self.flush_logs();
        std::process::exit(code);
    }
}

/// Linux packaging of the running installation.
///
/// The config override wins; otherwise `APPIMAGE` marks an AppImage and an
/// executable under `/usr` or `/opt` marks a system package.
pub fn detect_linux_packaging(
    configured: Option<LinuxPackaging>,
    appimage_env: Option<&str>,
    exe: Option<&Path>,
) -> LinuxPackaging {
    if let Some(packaging) = configured {
        return packaging;
    }
    if appimage_env.is_some_and(|v| !v.is_empty()) {
        return LinuxPackaging::AppImage;
    }
    if exe.is_some_and(|p| p.starts_with("/usr") || p.starts_with("/opt")) {
        return LinuxPackaging::Deb;
    }
    LinuxPackaging::AppImage
}

/// Installer for the running host.
pub fn for_host(config: &UpdateConfig) -> Box<dyn PlatformInstaller> {
    let platform = Platform::current();
    let arch = Arch::current();

    match platform {
        Platform::Linux => {
            let appimage_env = std::env::var("APPIMAGE").ok();
            let exe = std::env::current_exe().ok();
            match detect_linux_packaging(
                config.linux_packaging,
                appimage_env.as_deref(),
                exe.as_deref(),
            ) {
                LinuxPackaging::AppImage => Box::new(AppImageInstaller::new(
                    AppImageLayout::for_host(arch, config.keep_appimages),
                )),
                LinuxPackaging::Deb => Box::new(DebInstaller::new(
                    arch,
                    crate::potato_dirs::downloads_dir(),
                )),
            }
        }
        Platform::MacOs => Box::new(MacOsInstaller::new(arch, crate::potato_dirs::downloads_dir())),
        Platform::Windows => {
            Box::new(WindowsInstaller::new(arch, crate::potato_dirs::downloads_dir()))
        }
        Platform::Other(_) => Box::new(UnsupportedInstaller::new(platform, arch)),
    }
}
