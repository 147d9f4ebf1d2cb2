use std::{collections::BTreeMap, fmt::Display};

use anyhow::Result;
use chrono::{DateTime, Days, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    daemon::storage::{entities::CounterSnapshot, log_store::LogStore},
    utils::{display::format_count, time::date_to_record_name},
    view::get_live_today_count,
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long = "start",
        short,
        help = "First day of the range. Examples are \"yesterday\", \"2 weeks ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day of the range. Examples are \"yesterday\", \"2 weeks ago\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

const DEFAULT_PRINTED_DAYS: u64 = 7;

/// Command to process `history` command. Prints a line for every day between `start` and `end`,
/// days missing from the log are shown as `-`.
pub async fn process_history_command(
    HistoryCommand {
        start_date,
        end_date,
        date_style,
    }: HistoryCommand,
    log: impl LogStore,
    snapshot: &CounterSnapshot,
) -> Result<()> {
    let now = Local::now();
    let (start, end) = parse_range(start_date, end_date, date_style, now)?;
    let today = now.date_naive();

    let mut days = log.read_range(start..=end).await;
    if (start..=end).contains(&today) {
        days.insert(today, get_live_today_count(snapshot, today));
    }

    for line in render_range(start, end, &days) {
        println!("{line}");
    }
    Ok(())
}

fn parse_date(value: &str, now: DateTime<Local>, dialect: chrono_english::Dialect) -> Result<NaiveDate> {
    match parse_date_string(value, now, dialect) {
        Ok(v) => Ok(v.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {value:?}: {e}"),
            )
            .into()),
    }
}

/// Also provides sensible defaults for `history` command.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
    now: DateTime<Local>,
) -> Result<(NaiveDate, NaiveDate)> {
    let dialect: chrono_english::Dialect = date_style.into();
    let end = match end_date {
        Some(v) => parse_date(&v, now, dialect)?,
        None => now.date_naive(),
    };
    let start = match start_date {
        Some(v) => parse_date(&v, now, dialect)?,
        None => end
            .checked_sub_days(Days::new(DEFAULT_PRINTED_DAYS - 1))
            .unwrap_or(NaiveDate::MIN),
    };
    if start > end {
        return Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Start {start} is after end {end}"),
            )
            .into());
    }
    Ok((start, end))
}

fn render_range(start: NaiveDate, end: NaiveDate, days: &BTreeMap<NaiveDate, u64>) -> Vec<String> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| match days.get(&day) {
            Some(count) => format!("{}\t{}\t{count}", date_to_record_name(day), format_count(*count)),
            None => format!("{}\t-", date_to_record_name(day)),
        })
        .collect()
}
