//! Stdin/stdout JSON bridge for the UI shell.
//!
//! Reads newline-delimited [`CommandEnvelope`] messages from the input,
//! dispatches them to a [`HostHandler`], and writes [`ResponseEnvelope`]
//! replies and [`FrameEvent`] lines to the output.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::error::{PotatoError, Result};
use crate::events::FrameEvent;
use crate::host::contract::{CommandEnvelope, ResponseEnvelope};
use crate::host::handler::HostHandler;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Run the bridge over process stdin/stdout until `shutdown` is cancelled.
pub async fn run_stdio_bridge(
    events: mpsc::UnboundedReceiver<FrameEvent>,
    handler: Arc<dyn HostHandler>,
    shutdown: CancellationToken,
) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    run_bridge(stdin, stdout, events, handler, shutdown).await
}

/// Run the bridge over arbitrary streams.
///
/// Two concurrent tasks operate:
///
/// 1. **Event forwarder** -- writes every [`FrameEvent`] as a JSON line.
/// 2. **Reader** -- reads commands, dispatches them, writes the replies.
///
/// End of input stops command reading only; the bridge keeps forwarding
/// events until `shutdown` is cancelled (by `runtime.stop` or the caller).
pub async fn run_bridge<R, W>(
    input: R,
    output: W,
    mut events: mpsc::UnboundedReceiver<FrameEvent>,
    handler: Arc<dyn HostHandler>,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(output));

    let event_writer = Arc::clone(&writer);
    let event_shutdown = shutdown.clone();
    let event_handle = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = event_shutdown.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                tracing::info!("event channel closed; stopping event forwarder");
                break;
            };
            match serde_json::to_string(&event) {
                Ok(json) => {
                    let mut w = event_writer.lock().await;
                    if let Err(e) = write_line(&mut *w, &json).await {
                        tracing::warn!(
                            error = %e,
                            "failed to write event to stdout; stopping event forwarder"
                        );
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to serialize event; skipping"),
            }
        }
    });

    let reader_result = run_reader(input, Arc::clone(&writer), handler, shutdown.clone()).await;
    if reader_result.is_ok() {
        shutdown.cancelled().await;
    }

    shutdown.cancel();
    let _ = event_handle.await;
    reader_result
}

/// Read commands line by line until end of input or shutdown. A command
/// being dispatched always gets its response written.
async fn run_reader<R, W>(
    mut input: R,
    writer: Arc<Mutex<W>>,
    handler: Arc<dyn HostHandler>,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let read = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            read = input.read_line(&mut line) => read,
        };
        let bytes_read = read.map_err(|e| {
            PotatoError::Io(std::io::Error::other(format!("failed to read stdin: {e}")))
        })?;

        if bytes_read == 0 {
            tracing::info!("stdin closed (EOF); no further commands");
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<CommandEnvelope>(trimmed) {
            Ok(envelope) => {
                tracing::debug!(command = envelope.command.as_str(), "host command");
                match handler.handle(envelope.command).await {
                    Ok(payload) => ResponseEnvelope::ok(envelope.request_id, payload),
                    Err(e) => {
                        tracing::error!(error = %e, "host command failed");
                        ResponseEnvelope::error(envelope.request_id, e.to_string())
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse command");
                ResponseEnvelope::error("parse-error", format!("failed to parse command: {e}"))
            }
        };

        let json = serde_json::to_string(&response).map_err(|e| {
            PotatoError::Io(std::io::Error::other(format!(
                "failed to serialize response: {e}"
            )))
        })?;
        {
            let mut w = writer.lock().await;
            write_line(&mut *w, &json).await?;
        }

        if shutdown.is_cancelled() {
            tracing::info!("runtime.stop received; shutting down bridge");
            return Ok(());
        }
    }
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
