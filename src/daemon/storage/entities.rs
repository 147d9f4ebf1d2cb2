use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::utils::time::{date_to_record_name, record_name_to_date};

/// A single line of the daily log. There is at most one record per day.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub count: u64,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, count: u64) -> Self {
        Self { date, count }
    }

    /// Line as it is stored on disk, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl Display for DailyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", date_to_record_name(self.date), self.count)
    }
}

impl FromStr for DailyRecord {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches(['\n', '\r']);
        let mut fields = s.split(',');
        let (Some(date), Some(count), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(anyhow!("Expected 2 fields in {s:?}"));
        };
        let date = record_name_to_date(date.trim()).with_context(|| format!("Bad date in {s:?}"))?;
        let count = count
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Bad count in {s:?}"))?;
        Ok(Self { date, count })
    }
}

/// Scalar counters that survive restarts. `last_reset` is `None` until the first rollover check.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub daily: u64,
    #[serde(default)]
    pub last_reset: Option<DateTime<Local>>,
}

impl CounterSnapshot {
    /// Day the daily counter belongs to.
    pub fn counted_day(&self) -> Option<NaiveDate> {
        self.last_reset.map(|v| v.date_naive())
    }

    /// Daily count as seen on `today`. A counter left over from an earlier day counts as zero.
    pub fn daily_for(&self, today: NaiveDate) -> u64 {
        match self.counted_day() {
            Some(day) if day == today => self.daily,
            _ => 0,
        }
    }
}
