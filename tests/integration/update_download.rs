//! Resumable artifact downloads against live local servers.

use crate::helpers::{drain_events, payload, progress_of, serve_with_drop};
use potato::events::StatusEmitter;
use potato::update::{Downloader, ReleaseAsset};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn downloader(emitter: StatusEmitter) -> Downloader {
    Downloader::new("potential-potato-updater", 3, Duration::from_millis(5), emitter).unwrap()
}

fn asset(name: &str, url: String, size: usize) -> ReleaseAsset {
    ReleaseAsset {
        name: name.to_owned(),
        browser_download_url: url,
        size: Some(size as u64),
    }
}

#[tokio::test]
async fn dropped_connection_resumes_with_range_request() {
    let body = payload(64 * 1024);
    let server = serve_with_drop(body.clone(), 20_000).await;
    let dir = tempfile::tempdir().unwrap();
    let (emitter, mut rx) = StatusEmitter::channel();

    let name = "potential-potato-1.1.0-x86_64.AppImage";
    let path = downloader(emitter)
        .download(
            &asset(name, format!("{}/{name}", server.url), body.len()),
            dir.path(),
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), body);

    let requests = server.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2, "one cut attempt, one resumed attempt");
    assert!(!requests[0].contains("range:"));
    assert!(requests[1].contains("range: bytes=20000-"));

    let progress = progress_of(&drain_events(&mut rx));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
}

#[tokio::test]
async fn existing_partial_file_is_continued() {
    const TOTAL: usize = 10 * 1024 * 1024;
    const HAVE: usize = 4 * 1024 * 1024;

    let body = payload(TOTAL);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/potential-potato-1.1.0-x86_64.AppImage"))
        .and(header("range", format!("bytes={HAVE}-").as_str()))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {HAVE}-{}/{TOTAL}", TOTAL - 1).as_str(),
                )
                .set_body_bytes(body[HAVE..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let name = "potential-potato-1.1.0-x86_64.AppImage";
    std::fs::write(dir.path().join(name), &body[..HAVE]).unwrap();

    let (emitter, mut rx) = StatusEmitter::channel();
    let path = downloader(emitter)
        .download(
            &asset(name, format!("{}/dl/{name}", server.uri()), TOTAL),
            dir.path(),
        )
        .await
        .unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), TOTAL);
    assert!(written == body);

    let progress = progress_of(&drain_events(&mut rx));
    assert!(progress.first().is_some_and(|p| *p >= 40), "{progress:?}");
    assert_eq!(progress.last(), Some(&100));
}

#[tokio::test]
async fn server_ignoring_range_rewrites_file_from_start() {
    let body = payload(4096);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/update.deb"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("update.deb"), vec![0xAA; 1000]).unwrap();

    let (emitter, _rx) = StatusEmitter::channel();
    let path = downloader(emitter)
        .download(
            &asset("update.deb", format!("{}/dl/update.deb", server.uri()), body.len()),
            dir.path(),
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), body);
}

#[tokio::test]
async fn exhausted_attempts_report_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (emitter, mut rx) = StatusEmitter::channel();
    let err = downloader(emitter)
        .download(
            &asset("a.AppImage", format!("{}/a.AppImage", server.uri()), 10),
            dir.path(),
        )
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("failed after 3 attempts"), "{msg}");
    assert!(msg.contains("HTTP 500"), "{msg}");
    assert!(progress_of(&drain_events(&mut rx)).is_empty());
}

#[tokio::test]
async fn unsized_asset_uses_response_length_for_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (emitter, mut rx) = StatusEmitter::channel();
    let unsized_asset = ReleaseAsset {
        name: "setup.exe".to_owned(),
        browser_download_url: format!("{}/setup.exe", server.uri()),
        size: None,
    };
    let path = downloader(emitter)
        .download(&unsized_asset, dir.path())
        .await
        .unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"abc");
    assert_eq!(progress_of(&drain_events(&mut rx)), vec![100]);
}

#[tokio::test]
async fn asset_names_with_paths_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (emitter, _rx) = StatusEmitter::channel();
    let err = downloader(emitter)
        .download(
            &asset("../escape.AppImage", "http://127.0.0.1:9/x".to_owned(), 1),
            dir.path(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unsafe name"));
}
