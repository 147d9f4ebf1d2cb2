use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::{daemon::event::TrackerEvent, utils::clock::Clock};

/// Periodically asks the tracker to check for a new day. Besides the regular interval a check is
/// also scheduled right at local midnight.
pub struct RolloverTicker {
    next: mpsc::Sender<TrackerEvent>,
    shutdown: CancellationToken,
    check_interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl RolloverTicker {
    pub fn new(
        next: mpsc::Sender<TrackerEvent>,
        shutdown: CancellationToken,
        check_interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            check_interval,
            time_provider,
        }
    }

    /// Executes the ticker event loop.
    pub async fn run(self) -> Result<()> {
        loop {
            let regular = self.time_provider.instant() + self.check_interval;
            let check_point = regular.min(self.time_provider.next_midnight());

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(check_point) => ()
            }

            trace!("Requesting rollover check");
            self.next
                .send(TrackerEvent::Check)
                .await
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        }
    }
}
