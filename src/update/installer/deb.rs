//! Debian package installation through the system package manager.

use crate::error::{PotatoError, Result};
use crate::update::checker::ReleaseAsset;
use crate::update::installer::{InstallOutcome, PlatformInstaller};
use crate::update::platform::{Arch, Platform};
use crate::update::selector::{AssetTarget, select_asset};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{info, warn};

/// Delay between a successful install and process exit.
const EXIT_GRACE: Duration = Duration::from_secs(3);

/// `.deb` flavour of [`PlatformInstaller`].
///
/// Runs `pkexec dpkg -i <file>` by default. A failed install is not retried:
/// a half-configured package is not safe to install over.
#[derive(Debug, Clone)]
pub struct DebInstaller {
    platform: Platform,
    arch: Arch,
    download_dir: PathBuf,
    program: String,
    args: Vec<String>,
}

impl DebInstaller {
    /// Installer saving packages to `download_dir`.
    pub fn new(arch: Arch, download_dir: PathBuf) -> Self {
        Self {
            platform: Platform::Linux,
            arch,
            download_dir,
            program: "pkexec".to_owned(),
            args: vec!["dpkg".to_owned(), "-i".to_owned()],
        }
    }

    /// Replace the install command. The package path is appended to `args`.
    pub fn with_command(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }
}

fn log_output(stream: &str, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes);
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        info!("dpkg {stream}: {line}");
    }
}

#[async_trait]
impl PlatformInstaller for DebInstaller {
    fn platform(&self) -> &Platform {
        &self.platform
    }

    fn arch(&self) -> &Arch {
        &self.arch
    }

    fn select_asset<'a>(&self, assets: &'a [ReleaseAsset]) -> Option<&'a ReleaseAsset> {
        select_asset(assets, AssetTarget::LinuxDeb, &self.arch)
    }

    fn target_dir(&self, _asset: &ReleaseAsset) -> PathBuf {
        self.download_dir.clone()
    }

    async fn install(&self, artifact: &Path) -> Result<InstallOutcome> {
        info!("installing package {}", artifact.display());

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(artifact)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PotatoError::Install(format!("cannot run {}: {e}", self.program)))?;

        log_output("stdout", &output.stdout);
        log_output("stderr", &output.stderr);

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_owned(), |c| c.to_string());
            return Err(PotatoError::Install(format!(
                "Installation failed with code: {code}"
            )));
        }

        info!("package installed");
        if let Err(e) = tokio::fs::remove_file(artifact).await {
            warn!("cannot delete {}: {e}", artifact.display());
        }
        Ok(InstallOutcome::Exit { after: EXIT_GRACE })
    }
}
