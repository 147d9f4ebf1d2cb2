use ansi_term::{Colour, Style};
use chrono::{Datelike, Local, NaiveDate};
use clap::Parser;

use crate::{
    daemon::storage::{entities::CounterSnapshot, log_store::LogStore},
    utils::{display::format_count, time::date_to_record_name},
    view::{aggregate::{AggregateView, YearData}, get_year_data},
};

#[derive(Debug, Parser)]
pub struct CalendarCommand {
    #[arg(long, short, help = "Year to show. Defaults to the current one")]
    year: Option<i32>,
    #[arg(long, help = "Disable colors")]
    plain: bool,
}

/// Command to process `calendar` command. Prints every recorded day of a year, with today's value
/// taken from the live counter.
pub async fn process_calendar_command(
    CalendarCommand { year, plain }: CalendarCommand,
    log: impl LogStore,
    snapshot: &CounterSnapshot,
) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    let year = year.unwrap_or(today.year());

    let mut view = AggregateView::new(log);
    let data = get_year_data(&mut view, year, snapshot, today).await;

    for line in render_year(&data, today, plain) {
        println!("{line}");
    }
    Ok(())
}

fn render_year(data: &YearData, today: NaiveDate, plain: bool) -> Vec<String> {
    let mut lines = vec![];
    match data.range {
        Some((min, max)) => lines.push(format!("{} (history {min}-{max})", data.year)),
        None => lines.push(format!("{} (no history)", data.year)),
    }

    let highlight = if plain {
        Style::new()
    } else {
        Colour::Green.bold()
    };

    for (date, count) in &data.days {
        let line = format!(
            "{}\t{}\t{}",
            date_to_record_name(*date),
            format_count(*count),
            count
        );
        if *date == today {
            lines.push(highlight.paint(line).to_string());
        } else {
            lines.push(line);
        }
    }

    let total = data
        .days
        .values()
        .fold(0u64, |total, count| total.saturating_add(*count));
    lines.push(format!("total\t{}\t{total}", format_count(total)));
    lines
}
