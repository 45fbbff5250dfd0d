use crate::parser::{opener_from_bytes, StreamOpener};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to connect to stream '{stream}': {message}")]
    Connect { stream: String, message: String },

    #[error("checkpoint failed for partition {partition}: {message}")]
    Checkpoint { partition: String, message: String },

    #[error("stream platform error: {0}")]
    Platform(String),
}

/// One raw event as delivered by the platform.
#[derive(Debug, Clone)]
pub struct EventData {
    pub body: Arc<[u8]>,
    pub sequence_number: i64,
}

impl EventData {
    pub fn new(body: impl Into<Arc<[u8]>>, sequence_number: i64) -> Self {
        Self {
            body: body.into(),
            sequence_number,
        }
    }

    /// Opener over the event body; each call yields a fresh reader.
    pub fn opener(&self) -> StreamOpener {
        opener_from_bytes(Arc::clone(&self.body))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    LeaseLost,
    Shutdown,
}

/// Handle on one leased partition.
#[async_trait]
pub trait PartitionContext: Send + Sync {
    fn partition_id(&self) -> &str;

    /// Persists progress up to the last event delivered on this partition.
    async fn checkpoint(&self) -> Result<(), StreamError>;
}

/// Processes one partition. The platform calls it for one batch at a time,
/// in delivery order.
#[async_trait]
pub trait EventProcessor: Send {
    async fn open(&mut self, context: &dyn PartitionContext);

    async fn process_events(&mut self, context: &dyn PartitionContext, events: Vec<EventData>);

    async fn process_error(&mut self, context: &dyn PartitionContext, error: &StreamError);

    async fn close(&mut self, context: &dyn PartitionContext, reason: CloseReason);
}

pub trait ProcessorFactory: Send + Sync {
    fn create_processor(&self, context: &dyn PartitionContext) -> Box<dyn EventProcessor>;
}

/// Connection parameters for a partitioned event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub host_name: String,
    pub event_hub_name: String,
    pub consumer_group: String,
    pub connection_string: String,
    pub storage_connection_string: String,
    /// Container holding partition leases and checkpoints.
    pub lease_container: String,
}

/// A connected stream that hands partitions to registered processors.
#[async_trait]
pub trait StreamPlatform: Send + Sync {
    async fn register(&self, factory: Arc<dyn ProcessorFactory>) -> Result<(), StreamError>;

    async fn unregister(&self) -> Result<(), StreamError>;
}

#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, settings: &StreamSettings) -> Result<Arc<dyn StreamPlatform>, StreamError>;
}
