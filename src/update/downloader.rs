//! Resumable artifact downloads.
//!
//! Streams a release asset to disk with bounded retries and byte-range
//! resume. A partial file left by an earlier attempt (or an earlier run) is
//! continued with `Range: bytes=<offset>-` instead of starting over.
//!
//! The expected total size comes from the response's `Content-Range` or
//! `Content-Length` header; the size declared in release metadata is only
//! used to decide whether an existing file is a resumable partial.

use crate::error::{PotatoError, Result};
use crate::events::{FrameEvent, StatusEmitter};
use crate::update::checker::ReleaseAsset;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Mutable bookkeeping for one artifact download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadState {
    /// Destination file.
    pub path: PathBuf,
    /// Bytes already on disk; the next request starts here.
    pub offset: u64,
    /// Attempts made so far.
    pub attempt: u32,
    /// Total artifact size, once a response has told us.
    pub expected_total: Option<u64>,
}

/// Streams release assets to disk with retry and resume.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    max_attempts: u32,
    retry_base_delay: Duration,
    emitter: StatusEmitter,
}

impl Downloader {
    /// Create a downloader making at most `max_attempts` attempts, waiting
    /// `retry_base_delay * attempt` between them.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        user_agent: &str,
        max_attempts: u32,
        retry_base_delay: Duration,
        emitter: StatusEmitter,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(15))
            .read_timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
            retry_base_delay,
            emitter,
        })
    }

    /// Download `asset` into `target_dir`, returning the written file.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once all attempts are exhausted, or
    /// immediately if the asset name is not a plain file name.
    pub async fn download(&self, asset: &ReleaseAsset, target_dir: &Path) -> Result<PathBuf> {
        let path = target_path(target_dir, &asset.name)?;
        tokio::fs::create_dir_all(target_dir).await?;

        let declared = asset.size.filter(|s| *s > 0);
        let existing = file_len(&path).await;
        let offset = match declared {
            Some(total) if existing > 0 && existing < total => existing,
            _ => 0,
        };

        let mut state = DownloadState {
            path: path.clone(),
            offset,
            attempt: 0,
            expected_total: declared,
        };

        if offset > 0 {
            info!(file = %path.display(), offset, "resuming partial download");
        }

        loop {
            state.attempt += 1;
            match self
                .attempt(&asset.browser_download_url, &mut state)
                .await
            {
                Ok(()) => {
                    info!(
                        file = %path.display(),
                        bytes = state.offset,
                        attempts = state.attempt,
                        "download complete"
                    );
                    return Ok(path);
                }
                Err(e) => {
                    warn!(attempt = state.attempt, "download attempt failed: {e}");
                    if state.attempt >= self.max_attempts {
                        return Err(PotatoError::Download(format!(
                            "{} failed after {} attempts: {e}",
                            asset.name, state.attempt
                        )));
                    }
                    tokio::time::sleep(self.retry_base_delay * state.attempt).await;
                    state.offset = file_len(&path).await;
                    debug!(offset = state.offset, "retrying download");
                }
            }
        }
    }

    /// One request/stream pass. Updates `state.offset` as bytes land on disk.
    async fn attempt(&self, url: &str, state: &mut DownloadState) -> Result<()> {
        let mut request = self.client.get(url);
        if state.offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", state.offset));
        }

        let resp = request.send().await?;
        let status = resp.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE && state.offset > 0 {
            let total = header_str(resp.headers(), CONTENT_RANGE)
                .and_then(parse_content_range_total)
                .or(state.expected_total);
            if total == Some(state.offset) {
                debug!("partial file already complete");
                self.emitter
                    .emit(FrameEvent::UpdateDownloadProgress { percent: 100 });
                return Ok(());
            }
        }

        if !status.is_success() {
            return Err(PotatoError::Download(format!(
                "failed to download update: HTTP {}",
                status.as_u16()
            )));
        }

        let resuming = state.offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        if state.offset > 0 && !resuming {
            warn!("server ignored range request; restarting from byte 0");
            state.offset = 0;
        }

        if let Some(total) = reconcile_total(resp.headers(), state.offset) {
            state.expected_total = Some(total);
        }

        let mut file = if resuming {
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&state.path)
                .await?
        } else {
            tokio::fs::File::create(&state.path).await?
        };

        let mut stream = resp.bytes_stream();
        let mut last_percent: Option<u8> = None;
        let outcome: Result<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                state.offset += chunk.len() as u64;

                if let Some(percent) = progress_percent(state.offset, state.expected_total)
                    && last_percent != Some(percent)
                {
                    last_percent = Some(percent);
                    self.emitter
                        .emit(FrameEvent::UpdateDownloadProgress { percent });
                }
            }
            Ok(())
        }
        .await;

        finish_write(&mut file, outcome, &state.path).await
    }
}

/// Flush what a stream attempt wrote. After a clean stream a failed flush
/// fails the attempt; after a failed stream it is only logged.
async fn finish_write<W: AsyncWrite + Unpin>(
    file: &mut W,
    outcome: Result<()>,
    path: &Path,
) -> Result<()> {
    match outcome {
        Ok(()) => {
            file.flush().await?;
            Ok(())
        }
        Err(e) => {
            if let Err(flush_err) = file.flush().await {
                warn!("cannot flush {}: {flush_err}", path.display());
            }
            Err(e)
        }
    }
}

/// Join `name` onto `dir`, refusing anything that is not a bare file name.
fn target_path(dir: &Path, name: &str) -> Result<PathBuf> {
    match Path::new(name).file_name() {
        Some(file_name) if file_name == std::ffi::OsStr::new(name) => Ok(dir.join(file_name)),
        _ => Err(PotatoError::Download(format!(
            "refusing asset with unsafe name: {name:?}"
        ))),
    }
}

async fn file_len(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => 0,
    }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Total size from `Content-Range: bytes a-b/N` or `bytes */N`.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let value = value.trim();
    let rest = value
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes "))
        .map(|_| &value[6..])?;
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

/// Expected total from response headers. `Content-Range` wins; otherwise
/// `Content-Length` counts only the bytes after `offset`.
pub(crate) fn reconcile_total(headers: &HeaderMap, offset: u64) -> Option<u64> {
    if let Some(total) = header_str(headers, CONTENT_RANGE).and_then(parse_content_range_total) {
        return Some(total);
    }
    header_str(headers, CONTENT_LENGTH)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|len| offset + len)
}

/// Rounded whole percent clamped to `0..=100`, or `None` when the total is
/// unknown.
pub(crate) fn progress_percent(written: u64, total: Option<u64>) -> Option<u8> {
    let total = total.filter(|t| *t > 0)?;
    let rounded = (u128::from(written) * 100 + u128::from(total) / 2) / u128::from(total);
    Some(rounded.min(100) as u8)
}
