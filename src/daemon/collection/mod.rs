//! Producers of [TrackerEvent](super::event::TrackerEvent)s. Capturing keystrokes is left to the
//! host, which reports them as lines on an input stream.

pub mod input;
pub mod rollover;
