//! Repeating timers.
//!
//! Drives both the hourly update check and the image refresh loop.

pub mod runner;

pub use runner::{IntervalScheduler, ScheduleControl, ScheduleHandle};
