use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, error, info};

use crate::utils::time::days_between;

use super::storage::{
    counters::CounterStore,
    entities::{CounterSnapshot, DailyRecord},
    log_store::LogStore,
};

/// What [DayTracker::check_and_reset] found.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Rollover {
    /// Nothing was tracked before. Counting starts from the current day.
    FirstRun,
    /// Still the same day, the count was logged as a provisional total.
    SameDay { day: NaiveDate },
    /// The tracked day was finalized and the days in between were filled with zeros.
    RolledOver { finalized: NaiveDate, backfilled: usize },
}

/// Owns the running counters and decides when a day is over. There must be only one tracker per
/// log, every mutation goes through `&mut self`.
pub struct DayTracker<L: LogStore, C: CounterStore> {
    log: L,
    counters: C,
    snapshot: CounterSnapshot,
}

impl<L: LogStore, C: CounterStore> DayTracker<L, C> {
    pub fn new(log: L, counters: C) -> Self {
        let snapshot = counters.load();
        info!(
            "Loaded counters: total {}, daily {}, last reset {:?}",
            snapshot.total, snapshot.daily, snapshot.last_reset
        );
        Self {
            log,
            counters,
            snapshot,
        }
    }

    pub fn snapshot(&self) -> &CounterSnapshot {
        &self.snapshot
    }

    pub fn live_today_count(&self, today: NaiveDate) -> u64 {
        self.snapshot.daily_for(today)
    }

    pub async fn increment(&mut self) {
        self.add(1).await
    }

    /// Counts `events` at once. Counters are persisted right away, a failed write is only logged
    /// and the in memory values stay authoritative until the next successful one.
    pub async fn add(&mut self, events: u64) {
        self.snapshot.total = self.snapshot.total.saturating_add(events);
        self.snapshot.daily = self.snapshot.daily.saturating_add(events);
        self.persist().await;
    }

    /// Compares the tracked day with `now`. On the same day the count is logged as a provisional
    /// total, on a later day the tracked day is finalized, the gap is backfilled and the daily
    /// counter is reset.
    ///
    /// When the log can't be written the counters are left untouched, so the next call retries
    /// the whole rollover.
    pub async fn check_and_reset(&mut self, now: DateTime<Local>) -> Result<Rollover> {
        let today = now.date_naive();
        let Some(tracked) = self.snapshot.counted_day() else {
            info!("First run, tracking {today}");
            self.snapshot.last_reset = Some(now);
            self.persist().await;
            self.log
                .upsert_day(DailyRecord::new(today, self.snapshot.daily))
                .await?;
            return Ok(Rollover::FirstRun);
        };

        // A clock that went backwards keeps counting into the tracked day.
        if today <= tracked {
            debug!("Logging provisional count {} for {tracked}", self.snapshot.daily);
            self.log
                .upsert_day(DailyRecord::new(tracked, self.snapshot.daily))
                .await?;
            return Ok(Rollover::SameDay { day: tracked });
        }

        self.log
            .upsert_day(DailyRecord::new(tracked, self.snapshot.daily))
            .await?;
        let backfilled = self.fill_missing_days(tracked, today).await?;
        info!(
            "Finalized {tracked} with {} events, backfilled {backfilled} days",
            self.snapshot.daily
        );

        self.snapshot.daily = 0;
        self.snapshot.last_reset = Some(now);
        self.persist().await;

        Ok(Rollover::RolledOver {
            finalized: tracked,
            backfilled,
        })
    }

    /// Writes a zero record for every day strictly between `from` and `to`. Returns the number of
    /// written records.
    pub async fn fill_missing_days(&self, from: NaiveDate, to: NaiveDate) -> Result<usize> {
        let missing = days_between(from, to)
            .map(|day| DailyRecord::new(day, 0))
            .collect::<Vec<_>>();
        let count = missing.len();
        if count > 0 {
            self.log.upsert_days(missing).await?;
        }
        Ok(count)
    }

    async fn persist(&self) {
        if let Err(e) = self.counters.save(&self.snapshot).await {
            error!("Failed to persist counters {e:?}");
        }
    }
}
