//! Self-update from GitHub releases.
//!
//! Checks the latest release of the configured repository, picks the
//! artifact for this platform and architecture, downloads it with resume,
//! installs it the platform's way, and restarts into the new build.

pub mod checker;
pub mod downloader;
pub mod installer;
pub mod platform;
pub mod selector;
pub mod state;
pub mod updater;
pub mod version;

pub use checker::{CheckOutcome, Release, ReleaseAsset, UpdateChecker};
pub use downloader::{DownloadState, Downloader};
pub use installer::{InstallOutcome, PlatformInstaller, Relauncher, SystemRelauncher};
pub use platform::{Arch, Platform};
pub use selector::{AssetTarget, select_asset};
pub use state::{UpdatePhase, UpdateSession};
pub use updater::Updater;
pub use version::{compare_versions, is_newer};
