//! Headless frame host: runs the updater and the slideshow and talks to the
//! UI shell over stdin/stdout JSON.
//!
//! All tracing/diagnostic output goes to stderr and the daily log file so
//! that stdout remains a clean JSON protocol channel.

use potato::config::FrameConfig;
use potato::events::StatusEmitter;
use potato::host::handler::FrameRuntime;
use potato::host::stdio::run_stdio_bridge;
use potato::potato_dirs;
use potato::slideshow::{ImageRefresher, LocalShare};
use potato::update::{SystemRelauncher, Updater};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let file_appender = tracing_appender::rolling::daily(potato_dirs::logs_dir(), "potato.log");
    let (file_writer, log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("potato=info,info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let config_path = FrameConfig::default_config_path();
    let config = FrameConfig::load_or_default(&config_path).map_err(|e| {
        tracing::error!(error = %e, path = %config_path.display(), "invalid config");
        anyhow::anyhow!("cannot load {}: {e}", config_path.display())
    })?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "potato-host starting");

    let (emitter, events) = StatusEmitter::channel();
    let shutdown = CancellationToken::new();

    let updater = Arc::new(
        Updater::new(&config.update, env!("CARGO_PKG_VERSION"), emitter.clone())?
            .with_relauncher(Arc::new(SystemRelauncher::with_log_guard(log_guard))),
    );
    updater.prepare().await;
    let update_schedule = if updater.is_enabled() {
        Some(updater.start().await)
    } else {
        tracing::info!("no release repository configured; updates disabled");
        None
    };

    let mut runtime = FrameRuntime::new(shutdown.clone()).with_updater(Arc::clone(&updater));
    let slideshow_schedule = match (&config.share.root, config.slideshow.enabled) {
        (Some(root), true) => {
            let refresher = Arc::new(ImageRefresher::new(
                Arc::new(LocalShare::new(root)),
                config.share.directory.clone(),
                Duration::from_secs(config.slideshow.default_refresh_secs.max(1)),
                emitter.clone(),
            ));
            runtime = runtime.with_slideshow(Arc::clone(&refresher));
            Some(refresher.start())
        }
        _ => {
            tracing::info!("no image share configured; slideshow disabled");
            None
        }
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            signal_shutdown.cancel();
        }
    });

    let result = run_stdio_bridge(events, Arc::new(runtime), shutdown).await;

    updater.dispose();
    if let Some(handle) = update_schedule {
        handle.shutdown().await;
    }
    if let Some(handle) = slideshow_schedule {
        handle.shutdown().await;
    }

    result.map_err(|e| {
        tracing::error!(error = %e, "potato-host exited with error");
        anyhow::anyhow!("potato-host failed: {e}")
    })?;

    tracing::info!("potato-host shut down cleanly");
    Ok(())
}
