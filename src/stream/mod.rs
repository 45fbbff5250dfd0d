pub mod consumer;
pub mod platform;
pub mod processor;

pub use consumer::{stream_id, ConsumerError, ConsumerRegistry, StreamConsumer};
pub use platform::{
    CloseReason, EventData, EventProcessor, PartitionContext, ProcessorFactory, StreamConnector,
    StreamError, StreamPlatform, StreamSettings,
};
pub use processor::{PartitionProcessor, DEFAULT_CHECKPOINT_INTERVAL};
