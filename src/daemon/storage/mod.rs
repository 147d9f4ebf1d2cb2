//!  Storage is split into two stores.
//!   - [log_store::CsvLogStore] keeps the history, one `YYYY-MM-DD,count` line per day.
//!   - [counters::JsonCounterStore] keeps the running counters, so the current day survives a
//!     restart.
//!
//!  Only the last line of the log is ever rewritten. Everything before it is append only.

pub mod counters;
pub mod entities;
pub mod log_store;

pub const LOG_FILE_NAME: &str = "log.csv";
pub const COUNTERS_FILE_NAME: &str = "counters.json";
