/// Messages consumed by the processing module. Every mutation of the tracker goes through them,
/// which keeps the tracker on a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Counted input events.
    Increment(u64),
    /// Periodic rollover check.
    Check,
}
