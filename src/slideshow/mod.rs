//! Periodic image refresh from the photo share.
//!
//! Every refresh reads `settings.json` from the share directory, picks a
//! random image for today (a `MM-DD` folder, else `MM`, else the directory
//! itself), and publishes it as a data URL.

pub mod refresher;
pub mod share;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use refresher::{ImageRefresher, LoadedImage};
pub use share::{LocalShare, ShareClient};

/// Display settings published by the share's `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteSettings {
    /// Seconds between images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<f64>,
    /// CSS colour of the mat around the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passepartout_color: Option<String>,
    /// Mat width in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passepartout_width: Option<u32>,
    /// Crossfade length in milliseconds; 0 disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_duration: Option<u64>,
    /// Whether the UI shows the running version.
    pub show_app_version: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            refresh_rate: None,
            passepartout_color: Some("#222".to_owned()),
            passepartout_width: Some(150),
            transition_duration: Some(0),
            show_app_version: true,
        }
    }
}

impl RemoteSettings {
    /// Refresh period requested by the share, if it names a usable one.
    pub fn refresh_period(&self) -> Option<Duration> {
        self.refresh_rate
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
