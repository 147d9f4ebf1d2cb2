//! Query surface used by presentation layers. Nothing in here writes, the numbers come from the
//! daily log and the persisted counters.

pub mod aggregate;

use chrono::NaiveDate;

use crate::{
    daemon::storage::{entities::CounterSnapshot, log_store::LogStore},
    utils::display::format_count,
};

use aggregate::{AggregateView, YearData};

pub async fn get_year_data<L: LogStore>(
    view: &mut AggregateView<L>,
    year: i32,
    snapshot: &CounterSnapshot,
    today: NaiveDate,
) -> YearData {
    view.year_data(year, today, get_live_today_count(snapshot, today))
        .await
}

pub fn get_live_today_count(snapshot: &CounterSnapshot, today: NaiveDate) -> u64 {
    snapshot.daily_for(today)
}

/// Short text for the live counter, either today's count or the lifetime total.
pub fn get_formatted_display(
    snapshot: &CounterSnapshot,
    today: NaiveDate,
    show_total: bool,
) -> String {
    if show_total {
        format_count(snapshot.total)
    } else {
        format_count(get_live_today_count(snapshot, today))
    }
}
