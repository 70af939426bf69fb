//! Access to the image share.
//!
//! The frame reads images from a network share. [`ShareClient`] is the seam
//! to whatever client provides that access; [`LocalShare`] serves a share
//! that is already mounted into the filesystem.

use crate::error::{PotatoError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Read-only view of a file share. Paths are `/`-separated and relative to
/// the share root; the empty string is the root itself.
#[async_trait]
pub trait ShareClient: Send + Sync {
    /// Whether `path` exists.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Entry names directly inside directory `path`.
    async fn read_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Full contents of file `path`.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}

/// Normalise a share directory: empty, `/`, `.` and `./` mean the root and
/// leading slashes are dropped.
pub fn normalize_dir(dir: &str) -> &str {
    match dir.trim() {
        "" | "/" | "." | "./" => "",
        other => other.trim_start_matches('/'),
    }
}

/// Join `name` onto share directory `dir`.
pub fn join_share_path(dir: &str, name: &str) -> String {
    match normalize_dir(dir) {
        "" => name.to_owned(),
        dir => format!("{}/{name}", dir.trim_end_matches('/')),
    }
}

/// A share mounted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalShare {
    root: PathBuf,
}

impl LocalShare {
    /// Serve files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path for a share path. Parent and absolute components are
    /// rejected so nothing outside the root is reachable.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(normalize_dir(path));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(PotatoError::Slideshow(format!(
                        "path escapes the share: {path}"
                    )));
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ShareClient for LocalShare {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)?).await?)
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            PotatoError::Slideshow(format!("cannot list {}: {e}", dir.display()))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.resolve(path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| PotatoError::Slideshow(format!("cannot read {}: {e}", file.display())))
    }
}
