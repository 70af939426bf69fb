//! Repeating-timer background loop.
//!
//! Spawns a tokio task that runs one job on a fixed period. The loop also
//! wakes on manual triggers and on period changes, and stops once its
//! [`ScheduleControl`] is cancelled. Jobs run one at a time: triggers that
//! arrive while a job is running collapse into a single extra run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest period the timer accepts.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Longest period the timer accepts; deadlines must fit in an `Instant`.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Cloneable remote for a running [`IntervalScheduler`].
#[derive(Debug, Clone)]
pub struct ScheduleControl {
    trigger: Arc<Notify>,
    period: Arc<watch::Sender<Duration>>,
    cancel: CancellationToken,
}

impl ScheduleControl {
    /// Run the job as soon as the loop is free. Does not move the timer.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    /// Change the period. The timer is re-armed only when it differs.
    pub fn set_period(&self, period: Duration) {
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        self.period.send_if_modified(|current| {
            if *current == period {
                false
            } else {
                *current = period;
                true
            }
        });
    }

    /// Current period.
    pub fn period(&self) -> Duration {
        *self.period.borrow()
    }

    /// Stop the loop. A job already running finishes first.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    /// Whether [`Self::dispose`] was called.
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A job repeated on a fixed period.
#[derive(Debug)]
pub struct IntervalScheduler {
    name: &'static str,
    run_immediately: bool,
    control: ScheduleControl,
    period_rx: watch::Receiver<Duration>,
}

impl IntervalScheduler {
    /// Create a scheduler running every `period`.
    pub fn new(name: &'static str, period: Duration) -> Self {
        let (period_tx, period_rx) = watch::channel(period.clamp(MIN_PERIOD, MAX_PERIOD));
        Self {
            name,
            run_immediately: true,
            control: ScheduleControl {
                trigger: Arc::new(Notify::new()),
                period: Arc::new(period_tx),
                cancel: CancellationToken::new(),
            },
            period_rx,
        }
    }

    /// Whether the first run happens at start (default) or after one period.
    pub fn with_immediate_first_run(mut self, immediate: bool) -> Self {
        self.run_immediately = immediate;
        self
    }

    /// Stop the loop when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.control.cancel = token;
        self
    }

    /// Remote for this scheduler, usable before and after [`Self::run`].
    pub fn control(&self) -> ScheduleControl {
        self.control.clone()
    }

    /// Start the background loop.
    pub fn run<F, Fut>(self, mut job: F) -> ScheduleHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Self {
            name,
            run_immediately,
            control,
            mut period_rx,
        } = self;
        let loop_control = control.clone();

        let task = tokio::spawn(async move {
            let mut period = *period_rx.borrow_and_update();
            let mut interval = arm(period, run_immediately);
            info!(scheduler = name, ?period, "scheduler started");

            loop {
                tokio::select! {
                    biased;
                    () = loop_control.cancel.cancelled() => break,
                    _ = interval.tick() => {}
                    () = loop_control.trigger.notified() => {
                        debug!(scheduler = name, "manual trigger");
                    }
                    changed = period_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let next = *period_rx.borrow_and_update();
                        if next != period {
                            info!(scheduler = name, ?next, "period changed; re-arming timer");
                            period = next;
                            interval = arm(period, false);
                        }
                        continue;
                    }
                }

                job().await;
            }

            info!(scheduler = name, "scheduler stopped");
        });

        ScheduleHandle {
            control,
            task: Some(task),
        }
    }
}

fn arm(period: Duration, immediate: bool) -> tokio::time::Interval {
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Owner of a running scheduler loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct ScheduleHandle {
    control: ScheduleControl,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Remote for the running loop.
    pub fn control(&self) -> &ScheduleControl {
        &self.control
    }

    /// See [`ScheduleControl::trigger_now`].
    pub fn trigger_now(&self) {
        self.control.trigger_now();
    }

    /// See [`ScheduleControl::set_period`].
    pub fn set_period(&self, period: Duration) {
        self.control.set_period(period);
    }

    /// See [`ScheduleControl::dispose`].
    pub fn dispose(&self) {
        self.control.dispose();
    }

    /// Whether the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.control.dispose();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.control.dispose();
    }
}
