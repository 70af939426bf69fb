//! Full update cycles against a mocked releases API.

use crate::helpers::{
    RecordingRelauncher, StubInstaller, drain_events, payload, release_json, wait_for_event,
};
use potato::config::UpdateConfig;
use potato::events::{FrameEvent, StatusEmitter};
use potato::update::installer::InstallOutcome;
use potato::update::{UpdatePhase, Updater};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LATEST: &str = "/repos/einord/potential-potato/releases/latest";
const APPIMAGE: &str = "potential-potato-1.1.0-x86_64.AppImage";

fn config(server: &MockServer) -> UpdateConfig {
    UpdateConfig {
        repo: Some("einord/potential-potato".to_owned()),
        api_base_url: server.uri(),
        download_attempts: 2,
        retry_base_delay_ms: 1,
        restart_countdown_secs: 5,
        ..UpdateConfig::default()
    }
}

struct Harness {
    updater: Arc<Updater>,
    events: mpsc::UnboundedReceiver<FrameEvent>,
    relauncher: Arc<RecordingRelauncher>,
    dir: tempfile::TempDir,
}

fn harness(server: &MockServer, outcome: InstallOutcome, tick: Duration) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let (emitter, events) = StatusEmitter::channel();
    let relauncher = Arc::new(RecordingRelauncher::default());
    let updater = Updater::new(&config(server), "1.0.0", emitter)
        .unwrap()
        .with_installer(Box::new(StubInstaller::new(dir.path(), outcome)))
        .with_relauncher(relauncher.clone())
        .with_countdown_tick(tick);
    Harness {
        updater: Arc::new(updater),
        events,
        relauncher,
        dir,
    }
}

async fn mount_release(server: &MockServer, tag: &str, assets: &[(&str, u64)]) {
    let assets: Vec<(&str, String, u64)> = assets
        .iter()
        .map(|(name, size)| (*name, format!("{}/dl/{name}", server.uri()), *size))
        .collect();
    let assets: Vec<(&str, &str, u64)> = assets
        .iter()
        .map(|(n, u, s)| (*n, u.as_str(), *s))
        .collect();
    Mock::given(method("GET"))
        .and(path(LATEST))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json(tag, &assets)))
        .mount(server)
        .await;
}

async fn mount_artifact(server: &MockServer, name: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/dl/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn restarting_seconds(events: &[FrameEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            FrameEvent::UpdateRestarting { seconds_remaining } => Some(*seconds_remaining),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn same_version_reports_not_available() {
    let server = MockServer::start().await;
    mount_release(&server, "v1.0.0", &[(APPIMAGE, 10)]).await;
    let mut h = harness(&server, InstallOutcome::Restart, Duration::from_millis(1));

    h.updater.check_for_updates().await;

    let events = drain_events(&mut h.events);
    assert_eq!(
        events,
        vec![
            FrameEvent::UpdateChecking,
            FrameEvent::UpdateNotAvailable {
                version: "1.0.0".to_owned()
            },
        ]
    );
    assert_eq!(h.updater.phase(), UpdatePhase::Idle);
    assert!(std::fs::read_dir(h.dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn newer_release_downloads_and_counts_down_to_relaunch() {
    let server = MockServer::start().await;
    let body = payload(32 * 1024);
    mount_release(&server, "v1.1.0", &[(APPIMAGE, body.len() as u64)]).await;
    mount_artifact(&server, APPIMAGE, body.clone()).await;
    let mut h = harness(&server, InstallOutcome::Restart, Duration::from_millis(1));

    h.updater.check_for_updates().await;

    let events = drain_events(&mut h.events);
    let names: Vec<&str> = events.iter().map(FrameEvent::name).collect();
    assert_eq!(names[0], "update-checking");
    assert_eq!(
        events[1],
        FrameEvent::UpdateAvailable {
            version: "1.1.0".to_owned()
        }
    );
    assert!(events.contains(&FrameEvent::UpdateDownloadProgress { percent: 100 }));
    assert!(events.contains(&FrameEvent::UpdateDownloaded {
        version: "1.1.0".to_owned()
    }));
    assert_eq!(restarting_seconds(&events), vec![5, 4, 3, 2, 1, 0]);
    assert!(!names.contains(&"update-error"));

    let artifact = h.dir.path().join(APPIMAGE);
    assert_eq!(std::fs::read(&artifact).unwrap(), body);
    assert_eq!(*h.relauncher.relaunched.lock().unwrap(), vec![artifact.clone()]);
    assert_eq!(*h.relauncher.exits.lock().unwrap(), vec![0]);
    assert_eq!(h.updater.pending_artifact(), Some(artifact));
}

#[tokio::test]
async fn release_without_platform_asset_reports_one_error() {
    let server = MockServer::start().await;
    mount_release(&server, "v1.1.0", &[("Potential Potato-1.1.0.dmg", 10)]).await;
    let mut h = harness(&server, InstallOutcome::Restart, Duration::from_millis(1));

    h.updater.check_for_updates().await;

    let events = drain_events(&mut h.events);
    let errors: Vec<&FrameEvent> = events
        .iter()
        .filter(|e| matches!(e, FrameEvent::UpdateError { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    let FrameEvent::UpdateError { message } = errors[0] else {
        unreachable!()
    };
    assert!(
        message.contains("No update available for your platform (linux/"),
        "{message}"
    );
    assert!(!events.iter().any(|e| e.name() == "update-downloaded"));
    assert_eq!(h.updater.phase(), UpdatePhase::Idle);
    assert!(h.relauncher.relaunched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn api_failure_is_reported_once_and_cycle_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let mut h = harness(&server, InstallOutcome::Restart, Duration::from_millis(1));

    h.updater.check_for_updates().await;
    h.updater.check_for_updates().await;

    let events = drain_events(&mut h.events);
    assert_eq!(events.len(), 4, "{events:?}");
    assert_eq!(events[0], FrameEvent::UpdateChecking);
    assert_eq!(
        events[1],
        FrameEvent::UpdateError {
            message: "update error: GitHub API error: 500".to_owned()
        }
    );
    assert_eq!(events[2], FrameEvent::UpdateChecking);
}

#[tokio::test]
async fn disabled_updater_is_silent() {
    if std::env::var("UPDATE_REPO").is_ok() {
        return;
    }
    let server = MockServer::start().await;
    let (emitter, mut events) = StatusEmitter::channel();
    let config = UpdateConfig {
        repo: Some("not-a-repo".to_owned()),
        api_base_url: server.uri(),
        ..UpdateConfig::default()
    };
    let updater = Updater::new(&config, "1.0.0", emitter).unwrap();

    assert!(!updater.is_enabled());
    updater.check_for_updates().await;
    updater.check_now().await;

    assert!(drain_events(&mut events).is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn overlapping_checks_share_one_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LATEST))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(release_json("v1.0.0", &[]))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let mut h = harness(&server, InstallOutcome::Restart, Duration::from_millis(1));

    tokio::join!(
        h.updater.check_for_updates(),
        h.updater.check_for_updates()
    );

    let checking = drain_events(&mut h.events)
        .into_iter()
        .filter(|e| *e == FrameEvent::UpdateChecking)
        .count();
    assert_eq!(checking, 1);
}

#[tokio::test]
async fn cancelled_countdown_does_not_relaunch() {
    let server = MockServer::start().await;
    let body = payload(1024);
    mount_release(&server, "v1.1.0", &[(APPIMAGE, body.len() as u64)]).await;
    mount_artifact(&server, APPIMAGE, body).await;
    let mut h = harness(&server, InstallOutcome::Restart, Duration::from_millis(200));

    let updater = Arc::clone(&h.updater);
    let cycle = tokio::spawn(async move { updater.check_for_updates().await });

    wait_for_event(&mut h.events, |e| {
        matches!(e, FrameEvent::UpdateRestarting { seconds_remaining: 4 })
    })
    .await;
    assert!(h.updater.cancel_restart());
    cycle.await.unwrap();

    assert!(!h.updater.cancel_restart(), "nothing left to cancel");
    assert!(h.relauncher.relaunched.lock().unwrap().is_empty());
    assert!(h.relauncher.exits.lock().unwrap().is_empty());
    assert_eq!(h.updater.phase(), UpdatePhase::Idle);
    let rest = restarting_seconds(&drain_events(&mut h.events));
    assert!(!rest.contains(&0), "{rest:?}");
}

#[tokio::test]
async fn exit_outcome_quits_without_relaunch() {
    let server = MockServer::start().await;
    let body = payload(512);
    mount_release(&server, "v1.1.0", &[(APPIMAGE, body.len() as u64)]).await;
    mount_artifact(&server, APPIMAGE, body).await;
    let mut h = harness(
        &server,
        InstallOutcome::Exit {
            after: Duration::from_millis(1),
        },
        Duration::from_millis(1),
    );

    h.updater.check_for_updates().await;

    assert!(h.relauncher.relaunched.lock().unwrap().is_empty());
    assert_eq!(*h.relauncher.exits.lock().unwrap(), vec![0]);
    assert!(restarting_seconds(&drain_events(&mut h.events)).is_empty());
    assert_eq!(h.updater.phase(), UpdatePhase::Restarting);
}

#[tokio::test]
async fn prepared_updater_checks_immediately_once_started() {
    let server = MockServer::start().await;
    mount_release(&server, "v0.9.0", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let (emitter, mut events) = StatusEmitter::channel();
    let installer = StubInstaller::new(dir.path(), InstallOutcome::Restart);
    let prepared = Arc::clone(&installer.prepared);
    let updater = Arc::new(
        Updater::new(&config(&server), "1.0.0", emitter)
            .unwrap()
            .with_installer(Box::new(installer)),
    );

    updater.prepare().await;
    assert_eq!(prepared.load(Ordering::SeqCst), 1);

    let handle = updater.start().await;
    let seen = wait_for_event(&mut events, |e| e.name() == "update-not-available").await;
    assert_eq!(seen[0], FrameEvent::UpdateChecking);
    assert_eq!(prepared.load(Ordering::SeqCst), 1);

    updater.check_now().await;
    wait_for_event(&mut events, |e| e.name() == "update-not-available").await;

    handle.shutdown().await;
    updater.dispose();
}

#[cfg(unix)]
#[tokio::test]
async fn appimage_install_relaunches_through_stable_link() {
    use potato::update::Arch;
    use potato::update::installer::{AppImageInstaller, AppImageLayout};

    let server = MockServer::start().await;
    let body = payload(2048);
    mount_release(&server, "v1.1.0", &[(APPIMAGE, body.len() as u64)]).await;
    mount_artifact(&server, APPIMAGE, body).await;

    let root = tempfile::tempdir().unwrap();
    let layout = AppImageLayout {
        apps_dir: root.path().join("Applications"),
        bin_link: root.path().join("bin").join("potential-potato"),
        autostart_file: root.path().join("autostart").join("potential-potato.desktop"),
        running_exe: root
            .path()
            .join("Applications")
            .join("potential-potato-1.0.0-x86_64.AppImage"),
        arch: Arch::X64,
        keep: 2,
    };
    std::fs::create_dir_all(&layout.apps_dir).unwrap();
    std::fs::write(&layout.running_exe, b"old").unwrap();
    let bin_link = layout.bin_link.clone();
    let running = layout.running_exe.clone();

    let (emitter, _events) = StatusEmitter::channel();
    let relauncher = Arc::new(RecordingRelauncher::default());
    let updater = Updater::new(&config(&server), "1.0.0", emitter)
        .unwrap()
        .with_installer(Box::new(AppImageInstaller::new(layout)))
        .with_relauncher(relauncher.clone())
        .with_countdown_tick(Duration::from_millis(1));

    updater.check_for_updates().await;

    let artifact = root.path().join("Applications").join(APPIMAGE);
    assert_eq!(std::fs::read_link(&bin_link).unwrap(), artifact);
    assert_eq!(*relauncher.relaunched.lock().unwrap(), vec![bin_link]);
    assert!(running.exists(), "running AppImage must survive cleanup");

    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(&artifact).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
}

#[cfg(unix)]
#[tokio::test]
async fn disabled_updater_still_runs_appimage_housekeeping() {
    use potato::update::Arch;
    use potato::update::installer::{AppImageInstaller, AppImageLayout};

    let root = tempfile::tempdir().unwrap();
    let layout = AppImageLayout {
        apps_dir: root.path().join("Applications"),
        bin_link: root.path().join("bin").join("potential-potato"),
        autostart_file: root.path().join("autostart").join("potential-potato.desktop"),
        running_exe: root.path().join("Applications").join("running.AppImage"),
        arch: Arch::X64,
        keep: 2,
    };
    let autostart = layout.autostart_file.clone();
    let (emitter, mut events) = StatusEmitter::channel();
    let config = UpdateConfig {
        repo: None,
        ..UpdateConfig::default()
    };
    let updater = Updater::new(&config, "1.0.0", emitter)
        .unwrap()
        .with_installer(Box::new(AppImageInstaller::new(layout)));
    if updater.is_enabled() {
        return;
    }

    updater.prepare().await;

    let entry = std::fs::read_to_string(autostart).unwrap();
    assert!(entry.starts_with("[Desktop Entry]\n"));
    assert!(drain_events(&mut events).is_empty());
}
