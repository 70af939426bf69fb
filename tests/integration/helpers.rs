//! Shared helpers for integration tests.

use async_trait::async_trait;
use potato::events::FrameEvent;
use potato::update::installer::{InstallOutcome, PlatformInstaller, Relauncher};
use potato::update::{Arch, AssetTarget, Platform, ReleaseAsset, select_asset};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Drain all pending events from the receiver into a Vec.
pub(crate) fn drain_events(rx: &mut mpsc::UnboundedReceiver<FrameEvent>) -> Vec<FrameEvent> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

/// Wait until an event matching `pred` arrives, returning everything seen
/// up to and including it.
pub(crate) async fn wait_for_event(
    rx: &mut mpsc::UnboundedReceiver<FrameEvent>,
    pred: impl Fn(&FrameEvent) -> bool,
) -> Vec<FrameEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(evt) = rx.recv().await {
            let done = pred(&evt);
            seen.push(evt);
            if done {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for event");
    seen
}

/// Download progress percentages in emission order.
pub(crate) fn progress_of(events: &[FrameEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            FrameEvent::UpdateDownloadProgress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

/// Relauncher that records calls instead of spawning or exiting.
#[derive(Debug, Default)]
pub(crate) struct RecordingRelauncher {
    pub relaunched: Mutex<Vec<PathBuf>>,
    pub exits: Mutex<Vec<i32>>,
}

impl Relauncher for RecordingRelauncher {
    fn relaunch(&self, target: &Path) -> potato::Result<()> {
        self.relaunched.lock().unwrap().push(target.to_path_buf());
        Ok(())
    }

    fn exit(&self, code: i32) {
        self.exits.lock().unwrap().push(code);
    }
}

/// Linux x64 AppImage installer that downloads into a temp dir and reports
/// a fixed outcome.
#[derive(Debug)]
pub(crate) struct StubInstaller {
    pub dir: PathBuf,
    pub outcome: InstallOutcome,
    pub prepared: Arc<AtomicUsize>,
    platform: Platform,
    arch: Arch,
}

impl StubInstaller {
    pub(crate) fn new(dir: &Path, outcome: InstallOutcome) -> Self {
        Self {
            dir: dir.to_path_buf(),
            outcome,
            prepared: Arc::new(AtomicUsize::new(0)),
            platform: Platform::Linux,
            arch: Arch::X64,
        }
    }
}

#[async_trait]
impl PlatformInstaller for StubInstaller {
    fn platform(&self) -> &Platform {
        &self.platform
    }

    fn arch(&self) -> &Arch {
        &self.arch
    }

    fn select_asset<'a>(&self, assets: &'a [ReleaseAsset]) -> Option<&'a ReleaseAsset> {
        select_asset(assets, AssetTarget::LinuxAppImage, &self.arch)
    }

    fn target_dir(&self, _asset: &ReleaseAsset) -> PathBuf {
        self.dir.clone()
    }

    async fn prepare(&self) -> potato::Result<()> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn install(&self, _artifact: &Path) -> potato::Result<InstallOutcome> {
        Ok(self.outcome.clone())
    }
}

/// Plain HTTP server that cuts the first full-body response after `cut`
/// bytes and honours `Range: bytes=N-` afterwards.
pub(crate) struct DropServer {
    pub url: String,
    /// Lower-cased request heads in arrival order.
    pub requests: Arc<Mutex<Vec<String>>>,
}

pub(crate) async fn serve_with_drop(body: Vec<u8>, cut: usize) -> DropServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let body = Arc::new(body);

    tokio::spawn(async move {
        let mut dropped = false;
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            let head = String::from_utf8_lossy(&head).to_ascii_lowercase();
            log.lock().unwrap().push(head.clone());

            let start = head
                .lines()
                .find_map(|l| l.strip_prefix("range: bytes="))
                .and_then(|r| r.trim().trim_end_matches('-').parse::<usize>().ok());
            let len = body.len();

            let response = match start {
                Some(start) => {
                    let mut out = format!(
                        "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {start}-{}/{len}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        len - 1,
                        len - start
                    )
                    .into_bytes();
                    out.extend_from_slice(&body[start..]);
                    out
                }
                None if !dropped => {
                    dropped = true;
                    let mut out = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n"
                    )
                    .into_bytes();
                    out.extend_from_slice(&body[..cut]);
                    out
                }
                None => {
                    let mut out = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n"
                    )
                    .into_bytes();
                    out.extend_from_slice(&body);
                    out
                }
            };
            let _ = socket.write_all(&response).await;
            let _ = socket.flush().await;
            let _ = socket.shutdown().await;
        }
    });

    DropServer {
        url: format!("http://{addr}"),
        requests,
    }
}

/// Deterministic non-repeating-ish payload.
pub(crate) fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// GitHub-shaped `releases/latest` body.
pub(crate) fn release_json(tag: &str, assets: &[(&str, &str, u64)]) -> serde_json::Value {
    serde_json::json!({
        "tag_name": tag,
        "name": tag,
        "assets": assets
            .iter()
            .map(|(name, url, size)| serde_json::json!({
                "name": name,
                "browser_download_url": url,
                "size": size,
            }))
            .collect::<Vec<_>>(),
    })
}
