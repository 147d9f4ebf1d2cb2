//! Counts keystrokes in the background and keeps one line of history per day.
//! The daemon receives counted events from the host, the cli reads the history back.
//!

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod utils;
pub mod view;
