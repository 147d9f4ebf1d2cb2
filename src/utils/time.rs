use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

/// Format used for dates inside the daily log.
pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a string in keytally.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format(RECORD_DATE_FORMAT).to_string()
}

pub fn record_name_to_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value, RECORD_DATE_FORMAT)
}

/// Returns start of the next day. `None` when local midnight is skipped by a time zone transition.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> Option<DateTime<Tz>> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).earliest()
}

/// Days strictly between `from` and `to`, in ascending order.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().skip(1).take_while(move |day| *day < to)
}
