//! Per-cycle update session state.
//!
//! Tracks the phase of the current update cycle, the artifact staged for
//! relaunch, and the restart countdown. Owned by the updater; nothing else
//! mutates it.

use std::path::{Path, PathBuf};

/// Phase of the update state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Waiting for a timer tick or a manual trigger.
    #[default]
    Idle,
    /// Release lookup in flight.
    Checking,
    /// A newer release was found.
    Available,
    /// The running version is current.
    NotAvailable,
    /// Artifact download in flight (including retries).
    Downloading,
    /// Artifact staged on disk.
    Downloaded,
    /// Restart countdown running.
    Restarting,
    /// The cycle failed.
    Error,
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Available => "available",
            Self::NotAvailable => "not-available",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Restarting => "restarting",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Transient state for one update cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSession {
    phase: UpdatePhase,
    pending_artifact: Option<PathBuf>,
    countdown: Option<u32>,
}

impl UpdateSession {
    /// Current phase.
    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Artifact staged for relaunch, if any.
    pub fn pending_artifact(&self) -> Option<&Path> {
        self.pending_artifact.as_deref()
    }

    /// Seconds remaining while restarting.
    pub fn countdown(&self) -> Option<u32> {
        self.countdown
    }

    /// Move to `next`, logging the transition.
    pub fn transition(&mut self, next: UpdatePhase) {
        if self.phase != next {
            tracing::debug!(from = %self.phase, to = %next, "update phase");
        }
        self.phase = next;
        if next != UpdatePhase::Restarting {
            self.countdown = None;
        }
        if next == UpdatePhase::Idle {
            self.pending_artifact = None;
        }
    }

    /// Record the downloaded artifact and enter `downloaded`.
    pub fn stage(&mut self, artifact: PathBuf) {
        self.pending_artifact = Some(artifact);
        self.transition(UpdatePhase::Downloaded);
    }

    /// Enter or continue `restarting` with `seconds` left.
    pub fn tick_countdown(&mut self, seconds: u32) {
        if self.phase != UpdatePhase::Restarting {
            self.transition(UpdatePhase::Restarting);
        }
        self.countdown = Some(seconds);
    }

    /// Record a failure. The next cycle starts from `idle`.
    pub fn fail(&mut self) {
        self.transition(UpdatePhase::Error);
        self.pending_artifact = None;
    }

    /// Whether a new cycle may start from this state.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.phase,
            UpdatePhase::Idle | UpdatePhase::NotAvailable | UpdatePhase::Error
        )
    }
}
