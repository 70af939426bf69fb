//! GitHub release checker.
//!
//! Queries the latest published release of the configured repository and
//! compares its tag against the running version.

use crate::config::UpdateRepo;
use crate::error::{PotatoError, Result};
use crate::update::version::{is_newer, strip_tag_prefix};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// A published release.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Tag name (e.g. `"v1.2.0"`).
    pub tag_name: String,
    /// Downloadable artifacts.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Version string with the leading `v` removed.
    pub fn version(&self) -> &str {
        strip_tag_prefix(&self.tag_name)
    }
}

/// A single release artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    /// Asset filename.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
    /// Declared size in bytes. Not authoritative: transfer headers win.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Outcome of one release lookup.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// The running version is current (or newer).
    UpToDate {
        /// Latest published version.
        latest: String,
    },
    /// A newer release exists.
    Available(Release),
}

/// Release lookup against the GitHub REST API.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    client: reqwest::Client,
    api_base_url: String,
    repo: UpdateRepo,
    current_version: String,
}

impl UpdateChecker {
    /// Create a checker for `repo`, comparing against `current_version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base_url: &str, repo: UpdateRepo, current_version: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}-updater", repo.repo))
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            repo,
            current_version: current_version.to_owned(),
        })
    }

    /// Repository being checked.
    pub fn repo(&self) -> &UpdateRepo {
        &self.repo
    }

    /// Running version the checker compares against.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Fetch the latest published release.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status, or a body
    /// that is not a release object.
    pub async fn latest_release(&self) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base_url, self.repo.owner, self.repo.repo
        );

        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PotatoError::Update(format!(
                "GitHub API error: {}",
                status.as_u16()
            )));
        }

        resp.json::<Release>()
            .await
            .map_err(|e| PotatoError::Update(format!("malformed release response: {e}")))
    }

    /// Check whether a newer release than the running version exists.
    ///
    /// # Errors
    ///
    /// Propagates [`UpdateChecker::latest_release`] failures.
    pub async fn check(&self) -> Result<CheckOutcome> {
        let release = self.latest_release().await?;
        let latest = release.version().to_owned();

        info!(
            current = %self.current_version,
            latest = %latest,
            "release lookup finished"
        );

        if is_newer(&latest, &self.current_version) {
            Ok(CheckOutcome::Available(release))
        } else {
            Ok(CheckOutcome::UpToDate { latest })
        }
    }
}
