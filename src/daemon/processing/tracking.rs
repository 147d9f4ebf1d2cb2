use anyhow::Result;
use tracing::info;

use crate::{
    daemon::{
        event::TrackerEvent,
        storage::{counters::CounterStore, log_store::LogStore},
        tracker::{DayTracker, Rollover},
    },
    utils::clock::Clock,
};

use super::module::EventProcessor;

/// Bridges [ProcessingModule](super::ProcessingModule) and [DayTracker]. Every event starts with
/// a rollover check, so increments arriving after midnight are counted into the new day.
pub struct TrackingProcessor<L: LogStore, C: CounterStore> {
    tracker: DayTracker<L, C>,
    date_provider: Box<dyn Clock>,
}

impl<L: LogStore, C: CounterStore> TrackingProcessor<L, C> {
    pub fn new(tracker: DayTracker<L, C>, date_provider: Box<dyn Clock>) -> Self {
        Self {
            tracker,
            date_provider,
        }
    }

    async fn check(&mut self) -> Result<Rollover> {
        let rollover = self.tracker.check_and_reset(self.date_provider.time()).await?;
        if let Rollover::RolledOver { finalized, .. } = rollover {
            info!("Day {finalized} is over");
        }
        Ok(rollover)
    }
}

impl<L: LogStore, C: CounterStore> EventProcessor for TrackingProcessor<L, C> {
    async fn initialize(&mut self) -> Result<()> {
        self.check().await?;
        Ok(())
    }

    async fn process_next(&mut self, message: TrackerEvent) -> Result<()> {
        // Counting must not wait for a log that can't be written, so a failed check is only
        // reported after the events are counted.
        let checked = self.check().await;
        if let TrackerEvent::Increment(events) = message {
            self.tracker.add(events).await;
        }
        checked?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.check().await?;
        Ok(())
    }
}
