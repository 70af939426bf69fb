//! Potential Potato: a digital photo frame host.
//!
//! The host runs two background services and exposes them to a UI shell:
//!
//! - **Updater** ([`update`]): hourly release checks, resumable artifact
//!   downloads and per-platform installation with a restart countdown.
//! - **Slideshow** ([`slideshow`]): periodic random image selection from a
//!   mounted photo share, driven by the share's `settings.json`.
//!
//! Both report through [`events::StatusEmitter`]; the [`host`] bridge
//! forwards those events and accepts commands as newline-delimited JSON.

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod potato_dirs;
pub mod scheduler;
pub mod slideshow;
pub mod update;

pub use config::FrameConfig;
pub use error::{PotatoError, Result};
pub use events::{FrameEvent, StatusEmitter};
