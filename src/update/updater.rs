//! Update cycle orchestration.
//!
//! One [`Updater`] lives for the whole process. Each cycle runs
//! check → select → download → install → restart and reports every
//! transition through the [`StatusEmitter`]. Errors end the cycle with a
//! single `update-error` event; they never escape to the caller.

use crate::config::UpdateConfig;
use crate::error::{PotatoError, Result};
use crate::events::{FrameEvent, StatusEmitter};
use crate::scheduler::{IntervalScheduler, ScheduleControl, ScheduleHandle};
use crate::update::checker::{CheckOutcome, UpdateChecker};
use crate::update::downloader::Downloader;
use crate::update::installer::{
    InstallOutcome, PlatformInstaller, Relauncher, SystemRelauncher, for_host,
};
use crate::update::state::{UpdatePhase, UpdateSession};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Self-updater for the running application.
pub struct Updater {
    checker: Option<UpdateChecker>,
    installer: Box<dyn PlatformInstaller>,
    downloader: Downloader,
    emitter: StatusEmitter,
    relauncher: Arc<dyn Relauncher>,
    session: Mutex<UpdateSession>,
    cycle: tokio::sync::Mutex<()>,
    restart_cancel: Mutex<Option<CancellationToken>>,
    schedule: Mutex<Option<ScheduleControl>>,
    check_interval: Duration,
    countdown_secs: u32,
    countdown_tick: Duration,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("repo", &self.checker.as_ref().map(|c| c.repo().to_string()))
            .field("platform", self.installer.platform())
            .field("arch", self.installer.arch())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Create an updater for the running host.
    ///
    /// A missing or malformed repository leaves the updater disabled: every
    /// check becomes a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: &UpdateConfig, current_version: &str, emitter: StatusEmitter) -> Result<Self> {
        let repo = config.resolve_repo();
        let user_agent = repo.as_ref().map_or_else(
            || format!("{}-updater", crate::potato_dirs::APP_ID),
            |r| format!("{}-updater", r.repo),
        );
        let checker = repo
            .map(|repo| UpdateChecker::new(&config.api_base_url, repo, current_version))
            .transpose()?;
        let downloader = Downloader::new(
            &user_agent,
            config.download_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
            emitter.clone(),
        )?;

        Ok(Self {
            checker,
            installer: for_host(config),
            downloader,
            emitter,
            relauncher: Arc::new(SystemRelauncher::default()),
            session: Mutex::new(UpdateSession::default()),
            cycle: tokio::sync::Mutex::new(()),
            restart_cancel: Mutex::new(None),
            schedule: Mutex::new(None),
            check_interval: Duration::from_secs(config.check_interval_secs.max(1)),
            countdown_secs: config.restart_countdown_secs,
            countdown_tick: Duration::from_secs(1),
        })
    }

    /// Replace the platform installer.
    pub fn with_installer(mut self, installer: Box<dyn PlatformInstaller>) -> Self {
        self.installer = installer;
        self
    }

    /// Replace process control used at the end of a cycle.
    pub fn with_relauncher(mut self, relauncher: Arc<dyn Relauncher>) -> Self {
        self.relauncher = relauncher;
        self
    }

    /// Length of one restart countdown step (one second by default).
    pub fn with_countdown_tick(mut self, tick: Duration) -> Self {
        self.countdown_tick = tick;
        self
    }

    /// Whether a release repository is configured.
    pub fn is_enabled(&self) -> bool {
        self.checker.is_some()
    }

    /// Current phase of the update state machine.
    pub fn phase(&self) -> UpdatePhase {
        self.session().phase()
    }

    /// Artifact staged for relaunch, if any.
    pub fn pending_artifact(&self) -> Option<PathBuf> {
        self.session().pending_artifact().map(Path::to_path_buf)
    }

    fn session(&self) -> MutexGuard<'_, UpdateSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, phase: UpdatePhase) {
        self.session().transition(phase);
    }

    /// Startup housekeeping of the installed build (autostart entry, stable
    /// link, old AppImages). Runs whether or not updates are enabled.
    pub async fn prepare(&self) {
        if let Err(e) = self.installer.prepare().await {
            warn!("update housekeeping failed: {e}");
        }
    }

    /// Check now and every interval after.
    pub async fn start(self: &Arc<Self>) -> ScheduleHandle {
        let scheduler = IntervalScheduler::new("update-check", self.check_interval);
        *self.schedule.lock().unwrap_or_else(|e| e.into_inner()) = Some(scheduler.control());

        let updater = Arc::clone(self);
        scheduler.run(move || {
            let updater = Arc::clone(&updater);
            async move { updater.check_for_updates().await }
        })
    }

    /// Trigger an extra check without moving the hourly timer. Runs inline
    /// when the schedule has not been started.
    pub async fn check_now(&self) {
        let control = self
            .schedule
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match control {
            Some(control) if !control.is_disposed() => control.trigger_now(),
            _ => self.check_for_updates().await,
        }
    }

    /// Stop scheduled checks. A running cycle is left to finish.
    pub fn dispose(&self) {
        if let Some(control) = self.schedule.lock().unwrap_or_else(|e| e.into_inner()).take() {
            control.dispose();
        }
    }

    /// Cancel a running restart countdown. Returns `true` if one was running.
    pub fn cancel_restart(&self) -> bool {
        let token = self
            .restart_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run one full update cycle.
    ///
    /// Does nothing when disabled, when another cycle holds the lock, or
    /// while a staged update is waiting for restart.
    pub async fn check_for_updates(&self) {
        let Some(checker) = &self.checker else {
            return;
        };
        let Ok(_cycle) = self.cycle.try_lock() else {
            debug!("update cycle already running; skipping trigger");
            return;
        };
        if !self.session().is_settled() {
            debug!(phase = %self.phase(), "update staged; skipping check");
            return;
        }

        info!("checking for updates");
        self.transition(UpdatePhase::Checking);
        self.emitter.emit(FrameEvent::UpdateChecking);

        if let Err(e) = self.run_cycle(checker).await {
            error!("update cycle failed: {e}");
            self.session().fail();
            self.emitter.emit(FrameEvent::UpdateError {
                message: e.to_string(),
            });
            self.transition(UpdatePhase::Idle);
        }
    }

    async fn run_cycle(&self, checker: &UpdateChecker) -> Result<()> {
        let release = match checker.check().await? {
            CheckOutcome::UpToDate { .. } => {
                info!("no update available");
                self.transition(UpdatePhase::NotAvailable);
                self.emitter.emit(FrameEvent::UpdateNotAvailable {
                    version: checker.current_version().to_owned(),
                });
                self.transition(UpdatePhase::Idle);
                return Ok(());
            }
            CheckOutcome::Available(release) => release,
        };

        let version = release.version().to_owned();
        info!(%version, "update available");
        self.transition(UpdatePhase::Available);
        self.emitter.emit(FrameEvent::UpdateAvailable {
            version: version.clone(),
        });

        let asset = self
            .installer
            .select_asset(&release.assets)
            .cloned()
            .ok_or_else(|| {
                PotatoError::Update(format!(
                    "No update available for your platform ({}/{})",
                    self.installer.platform(),
                    self.installer.arch()
                ))
            })?;
        info!(asset = %asset.name, "selected release asset");

        let target_dir = self.installer.target_dir(&asset);
        self.installer
            .before_download(&target_dir.join(&asset.name))
            .await;

        self.transition(UpdatePhase::Downloading);
        let artifact = self.downloader.download(&asset, &target_dir).await?;
        self.installer.after_download(&artifact).await;

        self.session().stage(artifact.clone());
        self.emitter.emit(FrameEvent::UpdateDownloaded {
            version: version.clone(),
        });

        match self.installer.install(&artifact).await? {
            InstallOutcome::Restart => self.restart_countdown(&artifact).await,
            InstallOutcome::Exit { after } => {
                self.transition(UpdatePhase::Restarting);
                info!(?after, "exiting to complete installation");
                tokio::time::sleep(after).await;
                self.relauncher.exit(0);
                Ok(())
            }
            InstallOutcome::AwaitUser => {
                info!("installer handed to the user");
                self.transition(UpdatePhase::Idle);
                Ok(())
            }
        }
    }

    /// Count down, emitting each second, then relaunch into the staged build.
    async fn restart_countdown(&self, pending: &Path) -> Result<()> {
        let token = CancellationToken::new();
        *self.restart_cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());

        let mut remaining = self.countdown_secs;
        loop {
            self.session().tick_countdown(remaining);
            self.emitter.emit(FrameEvent::UpdateRestarting {
                seconds_remaining: remaining,
            });
            if remaining == 0 {
                break;
            }
            tokio::select! {
                () = token.cancelled() => {
                    info!("restart cancelled");
                    self.transition(UpdatePhase::Idle);
                    return Ok(());
                }
                () = tokio::time::sleep(self.countdown_tick) => {}
            }
            remaining -= 1;
        }
        self.restart_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let target = self.installer.launch_target(pending)?;
        info!("restarting into {}", target.display());
        self.relauncher.relaunch(&target)?;
        self.relauncher.exit(0);
        Ok(())
    }
}
