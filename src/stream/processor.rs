use super::platform::{CloseReason, EventData, EventProcessor, PartitionContext, StreamError};
use crate::index::{IndexClient, IndexError};
use crate::parser::{LogParser, RecordStream};
use crate::source::Source;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info};

pub const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
enum BatchError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("record stream failed: {0}")]
    Records(String),
}

/// Parses and pushes one partition's batches, checkpointing at most once per
/// interval and only after a push succeeded. A failed batch is dropped; its
/// events come back after a restart because the checkpoint never passed them.
pub struct PartitionProcessor {
    index: Arc<dyn IndexClient>,
    parser: Arc<dyn LogParser>,
    source: Arc<Source>,
    checkpoint_interval: Duration,
    last_checkpoint: Instant,
}

impl PartitionProcessor {
    pub fn new(
        index: Arc<dyn IndexClient>,
        parser: Arc<dyn LogParser>,
        source: Arc<Source>,
        checkpoint_interval: Duration,
    ) -> Self {
        Self {
            index,
            parser,
            source,
            checkpoint_interval,
            last_checkpoint: Instant::now(),
        }
    }

    /// Lazily parses every event in the batch into one record stream. The first
    /// parse error is also written to `failure`.
    fn records(&self, events: Vec<EventData>, failure: Arc<Mutex<Option<String>>>) -> RecordStream {
        let parser = Arc::clone(&self.parser);
        let source = Arc::clone(&self.source);
        Box::new(
            events
                .into_iter()
                .flat_map(move |event| parser.parse(event.opener(), None, &source))
                .map(move |record| {
                    if let Err(e) = &record {
                        if let Ok(mut slot) = failure.lock() {
                            slot.get_or_insert_with(|| e.to_string());
                        }
                    }
                    record
                }),
        )
    }

    /// A record error fails the batch even when the index client accepted
    /// the records around it.
    async fn push(&self, events: Vec<EventData>) -> Result<usize, BatchError> {
        let failure = Arc::new(Mutex::new(None));
        let records = self.records(events, Arc::clone(&failure));
        let pushed = self.index.push_batch(records, &self.source).await?;

        let failure = failure.lock().ok().and_then(|mut slot| slot.take());
        match failure {
            Some(message) => Err(BatchError::Records(message)),
            None => Ok(pushed),
        }
    }
}

#[async_trait]
impl EventProcessor for PartitionProcessor {
    async fn open(&mut self, context: &dyn PartitionContext) {
        info!(
            source = %self.source.type_key,
            partition = %context.partition_id(),
            "Partition opened"
        );
    }

    async fn process_events(&mut self, context: &dyn PartitionContext, events: Vec<EventData>) {
        let event_count = events.len();
        let pushed = match self.push(events).await {
            Ok(pushed) => pushed,
            Err(e) => {
                error!(
                    source = %self.source.type_key,
                    partition = %context.partition_id(),
                    events = event_count,
                    error = %e,
                    "Failed to push batch, dropping it"
                );
                return;
            }
        };
        debug!(
            partition = %context.partition_id(),
            events = event_count,
            records = pushed,
            "Pushed batch"
        );

        if self.last_checkpoint.elapsed() <= self.checkpoint_interval {
            return;
        }
        match context.checkpoint().await {
            Ok(()) => {
                self.last_checkpoint = Instant::now();
                debug!(partition = %context.partition_id(), "Checkpointed partition");
            }
            Err(e) => error!(
                partition = %context.partition_id(),
                error = %e,
                "Checkpoint failed"
            ),
        }
    }

    async fn process_error(&mut self, context: &dyn PartitionContext, error: &StreamError) {
        error!(
            source = %self.source.type_key,
            partition = %context.partition_id(),
            error = %error,
            "Stream error"
        );
    }

    async fn close(&mut self, context: &dyn PartitionContext, reason: CloseReason) {
        info!(
            source = %self.source.type_key,
            partition = %context.partition_id(),
            reason = ?reason,
            "Partition closed"
        );
    }
}
