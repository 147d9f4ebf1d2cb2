use anyhow::Result;

use crate::daemon::event::TrackerEvent;

/// Represents an event processor. Events are handed over one at a time, so a processor never has
/// to guard its state against concurrent access.
pub trait EventProcessor {
    /// Runs before the first event.
    fn initialize(&mut self) -> impl std::future::Future<Output = Result<()>>;

    fn process_next(&mut self, message: TrackerEvent) -> impl std::future::Future<Output = Result<()>>;

    /// Runs after the last event, when every producer is gone.
    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
