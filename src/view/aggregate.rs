use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::daemon::storage::log_store::LogStore;

/// Everything needed to show one year of history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearData {
    pub year: i32,
    pub days: BTreeMap<NaiveDate, u64>,
    /// Smallest and largest year that can be shown. `None` when there is no history yet.
    pub range: Option<(i32, i32)>,
}

/// Read side projection of the daily log. The log is only read again when a different year is
/// requested or after [AggregateView::invalidate].
pub struct AggregateView<L: LogStore> {
    log: L,
    cached: Option<YearData>,
}

impl<L: LogStore> AggregateView<L> {
    pub fn new(log: L) -> Self {
        Self { log, cached: None }
    }

    /// Drops the cached year, e.g. after the log was written to.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Returns the counts for `year`. The stored value for `today` lags behind the running
    /// counter, so it is always replaced with `live_today`.
    pub async fn year_data(&mut self, year: i32, today: NaiveDate, live_today: u64) -> YearData {
        let mut data = match self.cached.take() {
            Some(cached) if cached.year == year => cached,
            _ => self.load_year(year).await,
        };
        self.cached = Some(data.clone());

        if today.year() == year {
            data.days.insert(today, live_today);
            data.range = Some(match data.range {
                Some((min, max)) => (i32::min(min, year), i32::max(max, year)),
                None => (year, year),
            });
        }
        data
    }

    async fn load_year(&self, year: i32) -> YearData {
        debug!("Loading year {year}");
        YearData {
            year,
            days: self.log.read_year(year).await,
            range: self.log.year_range().await,
        }
    }
}
