use super::platform::{
    EventProcessor, PartitionContext, ProcessorFactory, StreamConnector, StreamError,
    StreamPlatform, StreamSettings,
};
use super::processor::PartitionProcessor;
use crate::index::IndexClient;
use crate::parser::{LogParser, ParserRegistry};
use crate::source::{Source, PROP_EVENT_HUB_NAME, PROP_PARSER, PROP_STORAGE_CONNECTION_STRING};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info};

const HOST_NAME: &str = "conveyor";
const CONSUMER_GROUP: &str = "$Default";

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("source '{source_key}' is missing property '{name}'")]
    MissingProperty { source_key: String, name: String },

    #[error("source '{source_key}' selects unknown parser '{parser}'")]
    UnknownParser { source_key: String, parser: String },

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
}

fn required<'a>(source: &'a Source, name: &str) -> Result<&'a str, ConsumerError> {
    source
        .property(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConsumerError::MissingProperty {
            source_key: source.type_key.clone(),
            name: name.to_string(),
        })
}

impl StreamSettings {
    /// Reads the stream properties (`EventHubName`, `StorageConnectionString`)
    /// of a source; leases live in a container named after the stream.
    pub fn from_source(source: &Source) -> Result<Self, ConsumerError> {
        let event_hub_name = required(source, PROP_EVENT_HUB_NAME)?.to_string();
        Ok(Self {
            host_name: HOST_NAME.to_string(),
            consumer_group: CONSUMER_GROUP.to_string(),
            connection_string: source.connection_string.clone(),
            storage_connection_string: required(source, PROP_STORAGE_CONNECTION_STRING)?
                .to_string(),
            lease_container: event_hub_name.clone(),
            event_hub_name,
        })
    }
}

/// Identifier under which a source's consumer is registered.
pub fn stream_id(source: &Source) -> Result<String, ConsumerError> {
    Ok(format!(
        "{}@{}",
        required(source, PROP_EVENT_HUB_NAME)?,
        source.type_key
    ))
}

/// Consumes one stream source: registered with the platform as the factory
/// of its partition processors.
pub struct StreamConsumer {
    source: Arc<Source>,
    parser: Arc<dyn LogParser>,
    index: Arc<dyn IndexClient>,
    platform: Arc<dyn StreamPlatform>,
    checkpoint_interval: Duration,
}

impl StreamConsumer {
    pub async fn start(
        source: Source,
        index: Arc<dyn IndexClient>,
        parsers: &ParserRegistry,
        connector: &dyn StreamConnector,
        checkpoint_interval: Duration,
    ) -> Result<Arc<Self>, ConsumerError> {
        let parser_name = required(&source, PROP_PARSER)?;
        let parser = parsers
            .get(parser_name)
            .ok_or_else(|| ConsumerError::UnknownParser {
                source_key: source.type_key.clone(),
                parser: parser_name.to_string(),
            })?;
        let settings = StreamSettings::from_source(&source)?;
        let platform = connector.connect(&settings).await?;

        let consumer = Arc::new(Self {
            source: Arc::new(source),
            parser,
            index,
            platform,
            checkpoint_interval,
        });
        consumer
            .platform
            .register(Arc::clone(&consumer) as Arc<dyn ProcessorFactory>)
            .await?;

        info!(
            source = %consumer.source.type_key,
            stream = %settings.event_hub_name,
            "Stream consumer registered"
        );
        Ok(consumer)
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub async fn stop(&self) -> Result<(), ConsumerError> {
        self.platform.unregister().await?;
        info!(source = %self.source.type_key, "Stream consumer unregistered");
        Ok(())
    }
}

impl ProcessorFactory for StreamConsumer {
    fn create_processor(&self, context: &dyn PartitionContext) -> Box<dyn EventProcessor> {
        info!(
            source = %self.source.type_key,
            partition = %context.partition_id(),
            "Creating partition processor"
        );
        Box::new(PartitionProcessor::new(
            Arc::clone(&self.index),
            Arc::clone(&self.parser),
            Arc::clone(&self.source),
            self.checkpoint_interval,
        ))
    }
}

/// One consumer per stream, created on first use. Concurrent first callers
/// for the same stream share a single construction.
pub struct ConsumerRegistry {
    index: Arc<dyn IndexClient>,
    parsers: ParserRegistry,
    connector: Arc<dyn StreamConnector>,
    checkpoint_interval: Duration,
    consumers: Mutex<HashMap<String, Arc<OnceCell<Arc<StreamConsumer>>>>>,
}

impl ConsumerRegistry {
    pub fn new(
        index: Arc<dyn IndexClient>,
        parsers: ParserRegistry,
        connector: Arc<dyn StreamConnector>,
        checkpoint_interval: Duration,
    ) -> Self {
        Self {
            index,
            parsers,
            connector,
            checkpoint_interval,
            consumers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, source: &Source) -> Result<Arc<StreamConsumer>, ConsumerError> {
        let id = stream_id(source)?;
        let cell = {
            let mut consumers = self.consumers.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(consumers.entry(id).or_default())
        };

        let consumer = cell
            .get_or_try_init(|| {
                StreamConsumer::start(
                    source.clone(),
                    Arc::clone(&self.index),
                    &self.parsers,
                    self.connector.as_ref(),
                    self.checkpoint_interval,
                )
            })
            .await?;
        Ok(Arc::clone(consumer))
    }

    /// Number of consumers that finished construction.
    pub fn len(&self) -> usize {
        let consumers = self.consumers.lock().unwrap_or_else(|e| e.into_inner());
        consumers.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn shutdown_all(&self) {
        let started: Vec<Arc<StreamConsumer>> = {
            let mut consumers = self.consumers.lock().unwrap_or_else(|e| e.into_inner());
            consumers
                .drain()
                .filter_map(|(_, cell)| cell.get().cloned())
                .collect()
        };

        let results = futures::future::join_all(started.iter().map(|c| c.stop())).await;
        for (consumer, result) in started.iter().zip(results) {
            if let Err(e) = result {
                error!(source = %consumer.source.type_key, error = %e, "Failed to stop consumer");
            }
        }
    }
}
