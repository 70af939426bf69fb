//! Linux AppImage installation.
//!
//! Versioned AppImages live in `~/Applications`. A stable link at
//! `~/.local/bin/potential-potato` points at the newest validated one and is
//! the launch target for both autostart and relaunch. Old AppImages are
//! pruned, but the file backing the running process is never deleted.

use crate::error::{PotatoError, Result};
use crate::update::checker::ReleaseAsset;
use crate::update::installer::{InstallOutcome, PlatformInstaller};
use crate::update::platform::{Arch, Platform};
use crate::update::selector::{AssetTarget, is_product_appimage, select_asset};
use crate::update::version::compare_versions;
use async_trait::async_trait;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;
use tracing::{info, warn};

static VERSION_IN_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)-(\d+\.\d+\.\d+)[^/]*\.appimage$").ok());

/// Version used when a file name carries none.
const UNKNOWN_VERSION: &str = "0.0.0";

/// One AppImage found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppImageFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Version embedded in the file name, or `0.0.0`.
    pub version: String,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Version embedded in an AppImage file name.
pub fn version_from_file_name(name: &str) -> String {
    VERSION_IN_NAME
        .as_ref()
        .and_then(|re| re.captures(name))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| UNKNOWN_VERSION.to_owned(), |m| m.as_str().to_owned())
}

/// Newest first: by version, then by modification time.
fn newest_first(a: &AppImageFile, b: &AppImageFile) -> Ordering {
    compare_versions(&b.version, &a.version).then_with(|| b.modified.cmp(&a.modified))
}

fn same_file(a: &Path, b: &Path) -> bool {
    let a = std::fs::canonicalize(a).unwrap_or_else(|_| a.to_path_buf());
    let b = std::fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf());
    a == b
}

/// Mark `path` executable (0o755).
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            PotatoError::Install(format!(
                "cannot set executable permission on {}: {e}",
                path.display()
            ))
        })?;
    }
    let _ = path;
    Ok(())
}

/// Filesystem layout managed by the AppImage installer.
#[derive(Debug, Clone)]
pub struct AppImageLayout {
    /// Directory holding versioned AppImages.
    pub apps_dir: PathBuf,
    /// Stable launch link.
    pub bin_link: PathBuf,
    /// Login autostart descriptor.
    pub autostart_file: PathBuf,
    /// File backing the running process.
    pub running_exe: PathBuf,
    /// Host architecture; only matching AppImages are managed.
    pub arch: Arch,
    /// AppImages kept by [`Self::prune`].
    pub keep: usize,
}

impl AppImageLayout {
    /// Standard layout for the current user.
    ///
    /// The running file comes from `APPIMAGE` (the mounted executable path
    /// is not the file on disk), falling back to the current executable.
    pub fn for_host(arch: Arch, keep: usize) -> Self {
        let running_exe = std::env::var_os("APPIMAGE")
            .map(PathBuf::from)
            .or_else(|| std::env::current_exe().ok())
            .unwrap_or_default();

        Self {
            apps_dir: crate::potato_dirs::linux_apps_dir(),
            bin_link: crate::potato_dirs::linux_bin_link(),
            autostart_file: crate::potato_dirs::linux_autostart_file(),
            running_exe,
            arch,
            keep,
        }
    }

    /// Product AppImages for this architecture, newest first.
    pub fn list_appimages(&self) -> Result<Vec<AppImageFile>> {
        std::fs::create_dir_all(&self.apps_dir)?;
        let token = self.arch.appimage_token();

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.apps_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_product_appimage(&name) || !name.contains(token) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            files.push(AppImageFile {
                path: entry.path(),
                version: version_from_file_name(&name),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        files.sort_by(newest_first);
        Ok(files)
    }

    /// (Re)write the login autostart descriptor pointing at the stable link.
    pub fn ensure_autostart(&self) -> Result<()> {
        if let Some(dir) = self.autostart_file.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let desktop = format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Potential Potato\n\
             Comment=Start Potential Potato at login\n\
             Exec={}\n\
             Icon=potential-potato\n\
             X-GNOME-Autostart-enabled=true\n\
             Terminal=false\n\
             Categories=Utility;\n",
            self.bin_link.display()
        );
        std::fs::write(&self.autostart_file, desktop)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &self.autostart_file,
                std::fs::Permissions::from_mode(0o644),
            )?;
        }

        info!("autostart entry written to {}", self.autostart_file.display());
        Ok(())
    }

    /// Resolved target of the stable link, if it is a link.
    pub fn link_target(&self) -> Option<PathBuf> {
        let target = std::fs::read_link(&self.bin_link).ok()?;
        if target.is_absolute() {
            Some(target)
        } else {
            self.bin_link.parent().map(|dir| dir.join(target))
        }
    }

    /// Whether the stable link exists and resolves to an existing file.
    pub fn link_is_healthy(&self) -> bool {
        self.link_target().is_some_and(|t| t.is_file())
    }

    /// Point the stable link at `target`: remove, recreate, verify.
    pub fn point_link(&self, target: &Path) -> Result<()> {
        if let Some(dir) = self.bin_link.parent() {
            std::fs::create_dir_all(dir)?;
        }

        for _ in 0..2 {
            let _ = std::fs::remove_file(&self.bin_link);
            create_symlink(target, &self.bin_link)?;
            if self.link_target().is_some_and(|t| same_file(&t, target)) {
                info!(
                    "stable link {} -> {}",
                    self.bin_link.display(),
                    target.display()
                );
                return Ok(());
            }
            warn!("stable link does not resolve to {}; repointing", target.display());
        }

        Err(PotatoError::Install(format!(
            "stable link {} does not resolve to {}",
            self.bin_link.display(),
            target.display()
        )))
    }

    /// Startup repair: when the link is missing or dangling, mark the newest
    /// AppImage executable and point the link at it, or remove the link if
    /// there is none. A healthy link is left
    /// alone. Returns the new target, if any.
    pub fn repair_link(&self) -> Result<Option<PathBuf>> {
        if self.link_is_healthy() {
            return Ok(None);
        }

        match self.list_appimages()?.into_iter().next() {
            Some(newest) => {
                set_executable(&newest.path)?;
                self.point_link(&newest.path)?;
                Ok(Some(newest.path))
            }
            None => {
                if self.bin_link.symlink_metadata().is_ok() {
                    std::fs::remove_file(&self.bin_link)?;
                    info!("removed dangling link {}", self.bin_link.display());
                }
                Ok(None)
            }
        }
    }

    /// Keep the newest `keep` AppImages and the running one; delete the rest.
    pub fn prune(&self) -> Result<Vec<PathBuf>> {
        let files = self.list_appimages()?;
        let doomed = files
            .into_iter()
            .skip(self.keep)
            .map(|f| f.path)
            .filter(|p| !same_file(p, &self.running_exe))
            .collect();
        Ok(self.delete_all(doomed))
    }

    /// Delete every AppImage except the running one and `keep`.
    pub fn prune_except(&self, keep: &[&Path]) -> Result<Vec<PathBuf>> {
        let doomed = self
            .list_appimages()?
            .into_iter()
            .map(|f| f.path)
            .filter(|p| !same_file(p, &self.running_exe))
            .filter(|p| !keep.iter().any(|k| same_file(p, k)))
            .collect();
        Ok(self.delete_all(doomed))
    }

    fn delete_all(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut deleted = Vec::with_capacity(paths.len());
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!("deleted old AppImage {}", path.display());
                    deleted.push(path);
                }
                Err(e) => warn!("cannot delete {}: {e}", path.display()),
            }
        }
        deleted
    }

    /// Relaunch target for a staged AppImage: the stable link (repointed to
    /// `pending` if it drifted), else `pending` itself.
    pub fn launch_target(&self, pending: &Path) -> Result<PathBuf> {
        if self.bin_link.exists() {
            if !self.link_target().is_some_and(|t| same_file(&t, pending))
                && pending.exists()
                && let Err(e) = self.point_link(pending)
            {
                warn!("cannot repoint stable link, launching file directly: {e}");
            }
            if self.bin_link.exists() && self.link_target().is_some_and(|t| same_file(&t, pending))
            {
                return Ok(self.bin_link.clone());
            }
        }

        if pending.exists() {
            return Ok(pending.to_path_buf());
        }

        Err(PotatoError::Install(
            "new version could not be started (file missing)".to_owned(),
        ))
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| {
        PotatoError::Install(format!(
            "cannot link {} -> {}: {e}",
            link.display(),
            target.display()
        ))
    })
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, link: &Path) -> Result<()> {
    Err(PotatoError::Install(format!(
        "symbolic links are not supported here: {}",
        link.display()
    )))
}

/// AppImage flavour of [`PlatformInstaller`].
#[derive(Debug, Clone)]
pub struct AppImageInstaller {
    layout: AppImageLayout,
    platform: Platform,
}

impl AppImageInstaller {
    /// Installer managing `layout`.
    pub fn new(layout: AppImageLayout) -> Self {
        Self {
            layout,
            platform: Platform::Linux,
        }
    }

    /// Managed filesystem layout.
    pub fn layout(&self) -> &AppImageLayout {
        &self.layout
    }
}

#[async_trait]
impl PlatformInstaller for AppImageInstaller {
    fn platform(&self) -> &Platform {
        &self.platform
    }

    fn arch(&self) -> &Arch {
        &self.layout.arch
    }

    fn select_asset<'a>(&self, assets: &'a [ReleaseAsset]) -> Option<&'a ReleaseAsset> {
        select_asset(assets, AssetTarget::LinuxAppImage, &self.layout.arch)
    }

    fn target_dir(&self, _asset: &ReleaseAsset) -> PathBuf {
        self.layout.apps_dir.clone()
    }

    async fn prepare(&self) -> Result<()> {
        if let Err(e) = self.layout.ensure_autostart() {
            warn!("cannot write autostart entry: {e}");
        }
        match self.layout.repair_link() {
            Ok(Some(target)) => info!("repaired stable link to {}", target.display()),
            Ok(None) => {}
            Err(e) => warn!("cannot repair stable link: {e}"),
        }
        self.layout.prune()?;
        Ok(())
    }

    async fn before_download(&self, target: &Path) {
        match self.layout.prune_except(&[target]) {
            Ok(deleted) if !deleted.is_empty() => {
                info!(count = deleted.len(), "freed space before download");
            }
            Ok(_) => {}
            Err(e) => warn!("pre-download cleanup failed: {e}"),
        }
    }

    async fn after_download(&self, artifact: &Path) {
        if let Err(e) = self.layout.prune_except(&[artifact]) {
            warn!("post-download cleanup failed: {e}");
        }
    }

    async fn install(&self, artifact: &Path) -> Result<InstallOutcome> {
        set_executable(artifact)?;
        if let Err(e) = self.layout.point_link(artifact) {
            warn!("stable link update failed, relaunch will use the file: {e}");
        }
        Ok(InstallOutcome::Restart)
    }

    fn launch_target(&self, pending: &Path) -> Result<PathBuf> {
        self.layout.launch_target(pending)
    }
}
