use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::utils::time::next_day_start;

const FALLBACK_WAIT: Duration = Duration::from_secs(60 * 60);

/// Represents an entity responsible for providing dates across application. This can allow it to
/// be used for testing. Day boundaries are evaluated in the local time zone.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Local>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);

    /// Instant at which the local day of [Clock::time] ends.
    fn next_midnight(&self) -> Instant {
        let now = self.time();
        let until = next_day_start(now)
            .and_then(|midnight| (midnight - now).to_std().ok())
            .unwrap_or(FALLBACK_WAIT);
        self.instant() + until
    }
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
