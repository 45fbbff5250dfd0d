use crate::config::Config;
use crate::index::{FetchError, HttpTemplateFetcher, IndexClient, MappingSynchronizer};
use crate::lock::{instance_id, LockCoordinator};
use crate::parser::ParserRegistry;
use crate::scheduler::queue::Receiver;
use crate::scheduler::{ChannelWorkQueue, MasterScheduler, StrategyRegistry, TracingTelemetry};
use crate::source::{ConfigurationStore, StoreError, PROP_EVENT_HUB_NAME};
use crate::stream::{ConsumerRegistry, StreamConnector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("template fetcher error: {0}")]
    Fetcher(#[from] FetchError),

    #[error("configuration store error: {0}")]
    Store(#[from] StoreError),
}

/// The scheduler and stream consumers of one instance, built from config.
///
/// The index client, configuration store, lock coordinator and stream
/// connector are supplied by the caller; everything else comes from `Config`.
pub struct Runtime {
    scheduler: MasterScheduler,
    consumers: ConsumerRegistry,
    store: Arc<dyn ConfigurationStore>,
    pass_interval: Duration,
}

impl Runtime {
    /// Returns the runtime and the receiving end of its work queue.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ConfigurationStore>,
        locks: Arc<dyn LockCoordinator>,
        index: Arc<dyn IndexClient>,
        connector: Arc<dyn StreamConnector>,
    ) -> Result<(Self, Receiver), RuntimeError> {
        let fetcher = HttpTemplateFetcher::new(config.index.template_timeout)?;
        let mappings = MappingSynchronizer::new(
            Arc::clone(&index),
            Arc::new(fetcher),
            &config.index.url,
            &config.index.mappings_path,
        );
        let (queue, work) = ChannelWorkQueue::new(config.scheduler.queue_capacity);

        let scheduler = MasterScheduler::new(
            Arc::clone(&store),
            locks,
            mappings,
            StrategyRegistry::with_builtins(),
            Arc::new(queue),
            Arc::new(TracingTelemetry),
            instance_id(),
            config.scheduler.lock_duration(),
        );
        let consumers = ConsumerRegistry::new(
            index,
            ParserRegistry::with_builtins(),
            connector,
            config.consumer.checkpoint_interval,
        );

        let runtime = Self {
            scheduler,
            consumers,
            store,
            pass_interval: config.scheduler.pass_interval,
        };
        Ok((runtime, work))
    }

    pub fn scheduler(&self) -> &MasterScheduler {
        &self.scheduler
    }

    pub fn consumers(&self) -> &ConsumerRegistry {
        &self.consumers
    }

    /// Starts a consumer for every active source that names an event stream.
    /// A source whose consumer cannot start is logged and skipped.
    pub async fn start_consumers(&self) -> Result<usize, RuntimeError> {
        let mut started = 0;
        for source in self.store.list_sources().await? {
            if !source.active || source.property(PROP_EVENT_HUB_NAME).is_none() {
                continue;
            }
            match self.consumers.get_or_create(&source).await {
                Ok(_) => started += 1,
                Err(e) => warn!(source = %source.type_key, error = %e, "Failed to start consumer"),
            }
        }
        Ok(started)
    }

    /// Runs until `shutdown` fires, then unregisters every consumer.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), RuntimeError> {
        let consumers = self.start_consumers().await?;
        info!(
            owner = %self.scheduler.owner(),
            consumers = consumers,
            "Runtime started"
        );

        self.scheduler.run(self.pass_interval, shutdown).await;
        self.consumers.shutdown_all().await;
        Ok(())
    }
}
