//! Dispatch of host commands to the running frame services.

use crate::error::Result;
use crate::host::contract::HostCommand;
use crate::slideshow::ImageRefresher;
use crate::update::Updater;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Executes one host command.
#[async_trait]
pub trait HostHandler: Send + Sync {
    /// Run `command` and return its payload.
    async fn handle(&self, command: HostCommand) -> Result<serde_json::Value>;
}

/// The updater and the slideshow behind the host bridge.
#[derive(Debug, Clone)]
pub struct FrameRuntime {
    updater: Option<Arc<Updater>>,
    slideshow: Option<Arc<ImageRefresher>>,
    shutdown: CancellationToken,
}

impl FrameRuntime {
    /// Runtime stopping `shutdown` on `runtime.stop`.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            updater: None,
            slideshow: None,
            shutdown,
        }
    }

    /// Attach the updater.
    pub fn with_updater(mut self, updater: Arc<Updater>) -> Self {
        self.updater = Some(updater);
        self
    }

    /// Attach the image refresher.
    pub fn with_slideshow(mut self, slideshow: Arc<ImageRefresher>) -> Self {
        self.slideshow = Some(slideshow);
        self
    }
}

#[async_trait]
impl HostHandler for FrameRuntime {
    async fn handle(&self, command: HostCommand) -> Result<serde_json::Value> {
        match command {
            HostCommand::HostPing => Ok(json!({
                "pong": true,
                "version": env!("CARGO_PKG_VERSION"),
            })),
            HostCommand::UpdateCheckNow => match &self.updater {
                Some(updater) if updater.is_enabled() => {
                    updater.check_now().await;
                    Ok(json!({ "triggered": true }))
                }
                _ => Ok(json!({ "triggered": false })),
            },
            HostCommand::UpdateCancelRestart => {
                let cancelled = self
                    .updater
                    .as_ref()
                    .is_some_and(|updater| updater.cancel_restart());
                Ok(json!({ "cancelled": cancelled }))
            }
            HostCommand::SlideshowNext => match &self.slideshow {
                Some(slideshow) => {
                    slideshow.next().await;
                    Ok(json!({ "triggered": true }))
                }
                None => Ok(json!({ "triggered": false })),
            },
            HostCommand::RuntimeStop => {
                self.shutdown.cancel();
                Ok(json!({ "stopping": true }))
            }
        }
    }
}
