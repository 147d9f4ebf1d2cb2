use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{error, trace};

use super::event::TrackerEvent;

pub mod module;
pub mod tracking;

/// Represents consumer of tracker events. This module is the only place where events are applied,
/// which serializes increments and rollover checks.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<TrackerEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<TrackerEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        if let Err(e) = self.processor.initialize().await {
            error!("Error initializing processor: {e:?}")
        }

        while let Some(event) = self.receiver.recv().await {
            trace!("Processing event {:?}", event);
            if let Err(e) = self.processor.process_next(event).await {
                error!("Error processing event {:?}: {e:?}", event)
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use tokio::sync::mpsc;

    use super::{module::EventProcessor, ProcessingModule};
    use crate::daemon::event::TrackerEvent;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl EventProcessor for &mut Recorder {
        async fn initialize(&mut self) -> Result<()> {
            self.calls.push("initialize".into());
            Err(anyhow!("initialization errors are not fatal"))
        }

        async fn process_next(&mut self, message: TrackerEvent) -> Result<()> {
            self.calls.push(format!("{message:?}"));
            match message {
                TrackerEvent::Check => Err(anyhow!("processing errors are not fatal")),
                TrackerEvent::Increment(_) => Ok(()),
            }
        }

        async fn finalize(&mut self) -> Result<()> {
            self.calls.push("finalize".into());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_events_are_processed_in_order() -> Result<()> {
        let (sender, receiver) = mpsc::channel(10);
        let mut recorder = Recorder::default();

        sender.send(TrackerEvent::Increment(2)).await?;
        sender.send(TrackerEvent::Check).await?;
        sender.send(TrackerEvent::Increment(1)).await?;
        drop(sender);

        ProcessingModule::new(receiver, &mut recorder).run().await?;

        assert_eq!(
            recorder.calls,
            vec!["initialize", "Increment(2)", "Check", "Increment(1)", "finalize"]
        );
        Ok(())
    }
}
