use std::{path::Path, time::Duration};

use anyhow::Result;
use collection::{
    input::{InputCollector, InputSource},
    rollover::RolloverTicker,
};
use event::TrackerEvent;
use processing::{tracking::TrackingProcessor, ProcessingModule};
use storage::{
    counters::JsonCounterStore, log_store::CsvLogStore, COUNTERS_FILE_NAME, LOG_FILE_NAME,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracker::DayTracker;

use crate::utils::clock::{Clock, DefaultClock};

pub mod args;
pub mod collection;
pub mod event;
pub mod processing;
pub mod shutdown;
pub mod storage;
pub mod tracker;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct DaemonOptions {
    pub input: InputSource,
    pub check_interval: Duration,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            input: InputSource::Stdin,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: &Path, options: DaemonOptions) -> Result<()> {
    info!("Starting daemon in {dir:?}");
    let (sender, receiver) = mpsc::channel::<TrackerEvent>(64);

    let shutdown_token = CancellationToken::new();

    let collector = InputCollector::new(sender.clone(), shutdown_token.clone());
    let ticker = create_ticker(sender, &shutdown_token, options.check_interval, DefaultClock);
    let processor = create_processor(dir, receiver, DefaultClock);

    let (_, collection_result, ticker_result, processing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        collector.run(options.input),
        ticker.run(),
        processor.run(),
    );

    if let Err(collection_result) = collection_result {
        error!("Collection module got an error {:?}", collection_result);
        shutdown_token.cancel();
    }

    if let Err(ticker_result) = ticker_result {
        error!("Rollover ticker got an error {:?}", ticker_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    Ok(())
}

fn create_ticker(
    sender: mpsc::Sender<TrackerEvent>,
    shutdown_token: &CancellationToken,
    check_interval: Duration,
    clock: impl Clock,
) -> RolloverTicker {
    RolloverTicker::new(
        sender,
        shutdown_token.clone(),
        check_interval,
        Box::new(clock),
    )
}

fn create_processor(
    dir: &Path,
    receiver: mpsc::Receiver<TrackerEvent>,
    clock: impl Clock,
) -> ProcessingModule<TrackingProcessor<CsvLogStore, JsonCounterStore>> {
    let tracker = DayTracker::new(
        CsvLogStore::new(dir.join(LOG_FILE_NAME)),
        JsonCounterStore::new(dir.join(COUNTERS_FILE_NAME)),
    );
    ProcessingModule::new(receiver, TrackingProcessor::new(tracker, Box::new(clock)))
}

#[cfg(test)]
mod daemon_tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Local, NaiveDate, TimeZone};
    use tempfile::tempdir;
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            collection::input::InputCollector,
            create_processor, create_ticker,
            event::TrackerEvent,
            storage::{
                counters::{CounterStore, JsonCounterStore},
                entities::DailyRecord,
                log_store::{CsvLogStore, LogStore},
                COUNTERS_FILE_NAME, LOG_FILE_NAME,
            },
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    /// Wall clock that can be moved by the test, e.g. across midnight.
    #[derive(Clone)]
    struct TestClock {
        now: Arc<Mutex<DateTime<Local>>>,
    }

    impl TestClock {
        fn at(time: DateTime<Local>) -> Self {
            Self {
                now: Arc::new(Mutex::new(time)),
            }
        }

        fn set(&self, time: DateTime<Local>) {
            *self.now.lock().unwrap() = time;
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Local> {
            *self.now.lock().unwrap()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    fn at(d: u32, hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, d, hour, 0, 0).single().unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    /// Runs the whole pipeline over a fixed input and a day change happening while the daemon
    /// is alive.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = TestClock::at(at(1, 10));
        let shutdown_token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel::<TrackerEvent>(10);

        let collector = InputCollector::new(sender.clone(), shutdown_token.clone());
        let ticker = create_ticker(
            sender,
            &shutdown_token,
            Duration::from_millis(100),
            clock.clone(),
        );
        let processor = create_processor(dir.path(), receiver, clock.clone());

        let (_, collection_result, ticker_result, processing_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                clock.set(at(3, 0));
                tokio::time::sleep(Duration::from_millis(500)).await;
                shutdown_token.cancel();
            },
            async {
                collector.run_reader(&b"a\nb\n5\n\nc\n"[..]).await?;
                drop(collector);
                anyhow::Ok(())
            },
            ticker.run(),
            processor.run(),
        );

        collection_result?;
        ticker_result?;
        processing_result?;

        let log = CsvLogStore::new(dir.path().join(LOG_FILE_NAME));
        assert_eq!(
            log.read_all().await?,
            vec![
                DailyRecord::new(date(1), 8),
                DailyRecord::new(date(2), 0),
                DailyRecord::new(date(3), 0),
            ]
        );

        let counters = JsonCounterStore::new(dir.path().join(COUNTERS_FILE_NAME)).load();
        assert_eq!(counters.total, 8);
        assert_eq!(counters.daily, 0);
        assert_eq!(counters.counted_day(), Some(date(3)));

        Ok(())
    }
}
