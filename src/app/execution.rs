//! Relay execution
//!
//! Feeds JSON-line notifications into an in-process broadcast bus and writes
//! every value the channel yields to the output, one per line.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::relay::{
    EventChannel, ListenArgs, LocalBroadcastBus, Notification, RelayBridge, RelayStats,
    StreamEvent,
};

/// What happened during one relay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Input lines read, blank lines excluded
    pub lines: u64,
    /// Lines that were not valid notifications
    pub malformed: u64,
    /// Values written to the output
    pub written: u64,
    pub relay: RelayStats,
}

/// Relay notifications from `input` to `output` until `input` is exhausted.
///
/// Fails only when the receiver cannot be registered or the output cannot be
/// written.
pub async fn run_relay<R, W>(
    input: R,
    output: &mut W,
    channel_name: &str,
    listen_args: &ListenArgs,
) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bus = Arc::new(LocalBroadcastBus::with_name("stdin"));
    let bridge = Arc::new(RelayBridge::new(bus.clone()));
    let channel = EventChannel::new(channel_name, bridge.clone());

    let mut stream = channel
        .listen(Some(listen_args.to_value()))
        .with_context(|| format!("Failed to listen on channel '{}'", channel_name))?;

    let mut summary = RunSummary::default();
    let mut lines = input.lines();
    let mut input_done = false;

    loop {
        tokio::select! {
            line = lines.next_line(), if !input_done => {
                match line.context("Failed to read input")? {
                    Some(line) => relay_line(&bus, &line, &mut summary),
                    None => {
                        debug!("Input exhausted, detaching listener");
                        input_done = true;
                        stream.cancel();
                    }
                }
            }
            event = stream.next() => {
                match event {
                    Some(StreamEvent::Value(value)) => {
                        output.write_all(value.as_bytes()).await.context("Failed to write output")?;
                        output.write_all(b"\n").await.context("Failed to write output")?;
                        output.flush().await.context("Failed to flush output")?;
                        summary.written += 1;
                    }
                    Some(StreamEvent::Error { code, message }) => {
                        warn!("Channel '{}' reported {}: {}", channel_name, code, message);
                    }
                    Some(StreamEvent::EndOfStream) | None => break,
                }
            }
        }
    }

    summary.relay = bridge.stats();
    info!(
        "Relay finished: {} line(s), {} malformed, {} forwarded, {} ignored",
        summary.lines,
        summary.malformed,
        summary.written,
        summary.relay.topic_mismatch + summary.relay.missing_field
    );
    Ok(summary)
}

fn relay_line(bus: &LocalBroadcastBus, line: &str, summary: &mut RunSummary) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    summary.lines += 1;

    match serde_json::from_str::<Notification>(line) {
        Ok(notification) => {
            let receivers = bus.send(&notification);
            debug!("Delivered {} to {} receiver(s)", notification, receivers);
        }
        Err(e) => {
            summary.malformed += 1;
            warn!("Skipping malformed line {}: {}", summary.lines, e);
        }
    }
}
