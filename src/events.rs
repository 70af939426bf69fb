//! One-way status events pushed to the UI layer.
//!
//! Publishers own delivery: [`StatusEmitter::emit`] never blocks and never
//! fails. Events sent after the receiver is gone are dropped.

use crate::slideshow::RemoteSettings;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Events delivered to the UI, serialized as `{"event": "<name>", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum FrameEvent {
    /// A release lookup started.
    UpdateChecking,
    /// A newer release exists.
    UpdateAvailable {
        /// Release version without the `v` prefix.
        version: String,
    },
    /// The running version is current.
    UpdateNotAvailable {
        /// Running version.
        version: String,
    },
    /// Download progress for the current attempt.
    UpdateDownloadProgress {
        /// Whole percent in `0..=100`.
        percent: u8,
    },
    /// The artifact is on disk.
    UpdateDownloaded {
        /// Release version.
        version: String,
    },
    /// Restart countdown tick.
    UpdateRestarting {
        /// Seconds left before relaunch.
        seconds_remaining: u32,
    },
    /// The update cycle failed.
    UpdateError {
        /// Human-readable reason.
        message: String,
    },
    /// A new image is ready to display.
    NewImage {
        /// File name inside the share.
        file_name: String,
        /// `data:image/<ext>;base64,...` URL.
        data_url: String,
    },
    /// The share's `settings.json` changed.
    RemoteSettingsUpdated(RemoteSettings),
    /// An image refresh failed.
    SlideshowError {
        /// Human-readable reason.
        message: String,
    },
}

impl FrameEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateChecking => "update-checking",
            Self::UpdateAvailable { .. } => "update-available",
            Self::UpdateNotAvailable { .. } => "update-not-available",
            Self::UpdateDownloadProgress { .. } => "update-download-progress",
            Self::UpdateDownloaded { .. } => "update-downloaded",
            Self::UpdateRestarting { .. } => "update-restarting",
            Self::UpdateError { .. } => "update-error",
            Self::NewImage { .. } => "new-image",
            Self::RemoteSettingsUpdated(_) => "remote-settings-updated",
            Self::SlideshowError { .. } => "slideshow-error",
        }
    }
}

/// Fire-and-forget publisher of [`FrameEvent`]s.
#[derive(Debug, Clone)]
pub struct StatusEmitter {
    tx: mpsc::UnboundedSender<FrameEvent>,
}

impl StatusEmitter {
    /// Create an emitter and the receiving end for the UI bridge.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FrameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish an event. Dropped silently when nobody listens.
    pub fn emit(&self, event: FrameEvent) {
        debug!(event = event.name(), "emit");
        if self.tx.send(event).is_err() {
            debug!("event receiver closed; dropping event");
        }
    }
}
