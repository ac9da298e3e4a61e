//! Debounce host: feeds input lines through a debouncer and writes out the
//! events that fire
//!
//! Each line is one call. The context is the line number plus its arrival
//! time, the argument is the line (or its payload, in keyed mode). At EOF
//! everything still pending is flushed so trailing calls are not lost.
//! Lines that are not valid UTF-8 are decoded lossily. A read error also
//! flushes what is pending before it is reported.

use crate::event::{as_millis, split_keyed, EventContext, FiredEvent};
use anyhow::{Context, Result};
use settle_core::{Debouncer, Scheduler, SettleConfig};
use settle_keyed::KeyedDebouncer;
use std::io::{self, Write};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub delay: Duration,
    pub keyed: bool,
    pub separator: String,
    pub purge_idle: bool,
    pub json: bool,
}

impl HostSettings {
    /// Settings from a validated config
    pub fn from_config(config: &SettleConfig, keyed: bool, json: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            delay: config.delay()?,
            keyed,
            separator: config.keyed.separator.clone(),
            purge_idle: config.keyed.purge_idle,
            json,
        })
    }
}

/// What happened during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Input lines read
    pub lines: u64,
    /// Events written out
    pub fired: u64,
    /// Of those, how many were flushed at EOF
    pub flushed: usize,
}

/// Debounce every line of `input`, writing fired events to `output`
///
/// Returns the summary and the output sink once all events are written.
pub async fn run<S, R, W>(
    settings: &HostSettings,
    scheduler: S,
    mut input: R,
    mut output: W,
) -> Result<(RunSummary, W)>
where
    S: Scheduler + Clone,
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<FiredEvent>();
    let json = settings.json;

    let printer = tokio::spawn(async move {
        let mut fired = 0u64;
        while let Some(event) = rx.recv().await {
            let line = event.render(json).context("Failed to render event")?;
            writeln!(output, "{}", line).context("Failed to write event")?;
            output.flush().context("Failed to flush output")?;
            fired += 1;
        }
        Ok::<_, anyhow::Error>((fired, output))
    });

    let start = Instant::now();
    let mut buf = Vec::new();
    let mut count = 0u64;

    debug!(
        delay = ?settings.delay,
        keyed = settings.keyed,
        "Debouncing input"
    );

    let (flushed, read) = if settings.keyed {
        let debouncer = KeyedDebouncer::new(
            move |key: String, context: EventContext, payload: String| {
                // The receiver only goes away if the printer failed
                let _ = tx.send(FiredEvent::new(context, Some(key), payload, start.elapsed()));
            },
            settings.delay,
            scheduler,
        );

        let read = loop {
            let line = match next_line(&mut input, &mut buf).await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            count += 1;
            let context = EventContext { line: count, received_ms: as_millis(start.elapsed()) };
            let (key, payload) = split_keyed(&line, &settings.separator);
            debouncer.call(key.to_string(), context, payload.to_string());

            if settings.purge_idle {
                debouncer.purge_idle();
            }
        };

        (debouncer.flush_all(), read)
    } else {
        let debouncer = Debouncer::new(
            move |context: EventContext, line: String| {
                let _ = tx.send(FiredEvent::new(context, None, line, start.elapsed()));
            },
            settings.delay,
            scheduler,
        );

        let read = loop {
            let line = match next_line(&mut input, &mut buf).await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            count += 1;
            let context = EventContext { line: count, received_ms: as_millis(start.elapsed()) };
            debouncer.call(context, line);
        };

        (usize::from(debouncer.flush()), read)
    };

    // Dropping the debouncer released the last sender, so the printer drains
    // and stops.
    let (fired, output) = printer.await.context("Printer task failed")??;
    read.context("Failed to read input")?;

    let summary = RunSummary { lines: count, fired, flushed };
    info!(
        lines = summary.lines,
        fired = summary.fired,
        flushed = summary.flushed,
        "Input closed"
    );

    Ok((summary, output))
}

/// Read one line without its `\n` or `\r\n` terminator, replacing invalid
/// UTF-8 with U+FFFD
///
/// Returns `None` at EOF.
async fn next_line<R>(input: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if input.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
