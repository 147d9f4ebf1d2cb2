use std::path::{Path, PathBuf};

use anyhow::Result;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::daemon::event::TrackerEvent;

/// Where counted events come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    /// A named pipe, reopened every time the writer goes away. A regular file is read once.
    Fifo(PathBuf),
}

/// Turns lines of an input stream into increments. An empty line is ignored, a line holding a
/// number counts that many events and any other line counts as one event.
pub struct InputCollector {
    next: mpsc::Sender<TrackerEvent>,
    shutdown: CancellationToken,
}

/// Number of events a single input line stands for.
pub fn events_in_line(line: &str) -> u64 {
    let line = line.trim();
    if line.is_empty() {
        0
    } else {
        line.parse::<u64>().unwrap_or(1)
    }
}

#[cfg(unix)]
async fn is_fifo(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;

    tokio::fs::metadata(path)
        .await
        .map(|v| v.file_type().is_fifo())
        .unwrap_or(false)
}

/// Only unix pipes are reopened, anything else is read once.
#[cfg(not(unix))]
async fn is_fifo(_path: &Path) -> bool {
    false
}

impl InputCollector {
    pub fn new(next: mpsc::Sender<TrackerEvent>, shutdown: CancellationToken) -> Self {
        Self { next, shutdown }
    }

    /// Executes the collector until the source is exhausted or shutdown is requested.
    pub async fn run(self, source: InputSource) -> Result<()> {
        match source {
            InputSource::Stdin => self.run_reader(tokio::io::stdin()).await,
            InputSource::Fifo(path) => loop {
                let file = tokio::select! {
                    _ = self.shutdown.cancelled() => return Ok(()),
                    file = tokio::fs::File::open(&path) => file?,
                };
                info!("Reading events from {path:?}");
                self.run_reader(file).await?;
                if self.shutdown.is_cancelled() || !is_fifo(&path).await {
                    return Ok(());
                }
            },
        }
    }

    /// Reads events from `reader` until it is exhausted. The sender is kept, so the processing
    /// module lives until shutdown.
    pub async fn run_reader(&self, reader: impl AsyncRead + Unpin) -> Result<()> {
        let mut lines = LinesStream::new(BufReader::new(reader).lines());
        loop {
            let line = tokio::select! {
                // Cancelation drops the sender together with the collector, which stops the
                // processing module.
                _ = self.shutdown.cancelled() => return Ok(()),
                line = lines.next() => line,
            };

            match line {
                Some(Ok(line)) => {
                    let events = events_in_line(&line);
                    if events == 0 {
                        continue;
                    }
                    debug!("Counted {events} events");
                    self.next
                        .send(TrackerEvent::Increment(events))
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                }
                Some(Err(e)) => {
                    warn!("Failed to read input {e}");
                    return Ok(());
                }
                None => {
                    debug!("Input exhausted");
                    return Ok(());
                }
            }
        }
    }
}
