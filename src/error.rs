//! Error types for the photo frame host.

/// Top-level error type for the updater and the slideshow.
#[derive(Debug, thiserror::Error)]
pub enum PotatoError {
    /// Release lookup or update-cycle error.
    #[error("update error: {0}")]
    Update(String),

    /// Artifact download error (network, HTTP status, disk write).
    #[error("download error: {0}")]
    Download(String),

    /// Platform install or restart error.
    #[error("install error: {0}")]
    Install(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Image share or refresh error.
    #[error("slideshow error: {0}")]
    Slideshow(String),

    /// Repeating timer error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PotatoError>;
