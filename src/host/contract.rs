//! Command and response envelopes for the host bridge.
//!
//! The UI shell writes one [`CommandEnvelope`] per line to stdin and reads
//! one [`ResponseEnvelope`] per command back from stdout, interleaved with
//! `FrameEvent` lines.

use serde::{Deserialize, Serialize};

/// Commands the UI shell can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostCommand {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "update.check_now")]
    UpdateCheckNow,
    #[serde(rename = "update.cancel_restart")]
    UpdateCancelRestart,
    #[serde(rename = "slideshow.next")]
    SlideshowNext,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl HostCommand {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::UpdateCheckNow => "update.check_now",
            Self::UpdateCancelRestart => "update.cancel_restart",
            Self::SlideshowNext => "slideshow.next",
            Self::RuntimeStop => "runtime.stop",
        }
    }
}

/// A command line read from stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Echoed back in the response.
    #[serde(default)]
    pub request_id: String,
    /// What to do.
    pub command: HostCommand,
}

impl CommandEnvelope {
    /// Build an envelope.
    pub fn new(request_id: impl Into<String>, command: HostCommand) -> Self {
        Self {
            request_id: request_id.into(),
            command,
        }
    }
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Request this answers.
    pub request_id: String,
    /// Whether the command succeeded.
    pub ok: bool,
    /// Command result.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    /// Failure reason when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Successful reply.
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Failed reply.
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}
