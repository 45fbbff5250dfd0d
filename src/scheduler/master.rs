use super::queue::{QueueError, WorkQueue};
use super::strategy::{StrategyError, StrategyRegistry};
use super::telemetry::{instrument, TelemetrySink, SCHEDULE_DURATION, SINCE_LAST_SCHEDULED};
use crate::index::{MappingError, MappingSynchronizer};
use crate::lock::{LockCoordinator, LockToken};
use crate::source::{ConfigurationStore, Source, StoreError};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("configuration store error: {0}")]
    Store(#[from] StoreError),

    #[error("mapping setup failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("work queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("could not find scheduler type: {0}")]
    UnknownStrategy(String),

    #[error("scheduling panicked: {0}")]
    Panicked(String),
}

/// What happened to one source during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Another instance holds the source's lock.
    LockBusy,
    Inactive,
    NotDue,
    /// The strategy ran; `items` were produced and, on success, enqueued.
    Scheduled { items: usize, success: bool },
    /// The strategy named by the source is not registered.
    Misconfigured(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<(String, SourceOutcome)>,
}

impl PassReport {
    pub fn outcome(&self, type_key: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(key, _)| key == type_key)
            .map(|(_, outcome)| outcome)
    }

    pub fn count(&self, predicate: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }
}

// Whether a cycle's result should be written back to the store.
enum Cycle {
    Skip(SourceOutcome),
    Persist(SourceOutcome),
}

/// Runs scheduling passes over every configured source. Each source is only
/// worked on while this instance holds its lock, so instances can share the
/// load source by source.
pub struct MasterScheduler {
    store: Arc<dyn ConfigurationStore>,
    locks: Arc<dyn LockCoordinator>,
    mappings: MappingSynchronizer,
    strategies: StrategyRegistry,
    queue: Arc<dyn WorkQueue>,
    telemetry: Arc<dyn TelemetrySink>,
    owner: String,
    lock_duration: Duration,
}

impl MasterScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ConfigurationStore>,
        locks: Arc<dyn LockCoordinator>,
        mappings: MappingSynchronizer,
        strategies: StrategyRegistry,
        queue: Arc<dyn WorkQueue>,
        telemetry: Arc<dyn TelemetrySink>,
        owner: impl Into<String>,
        lock_duration: Duration,
    ) -> Self {
        Self {
            store,
            locks,
            mappings,
            strategies,
            queue,
            telemetry,
            owner: owner.into(),
            lock_duration,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Runs passes every `pass_interval` until `shutdown` flips or its sender
    /// goes away.
    pub async fn run(&self, pass_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(pass_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(owner = %self.owner, "Master scheduler started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.schedule_sources().await {
                        Ok(report) => info!(
                            sources = report.outcomes.len(),
                            scheduled = report.count(|o| matches!(o, SourceOutcome::Scheduled { .. })),
                            busy = report.count(|o| *o == SourceOutcome::LockBusy),
                            failed = report.count(|o| matches!(o, SourceOutcome::Failed(_) | SourceOutcome::Misconfigured(_))),
                            "Scheduling pass complete"
                        ),
                        Err(e) => error!(error = %e, "Scheduling pass failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Master scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub async fn schedule_sources(&self) -> Result<PassReport, SchedulerError> {
        self.schedule_sources_at(Utc::now()).await
    }

    /// One pass over every source, using `now` as the pass time throughout.
    pub async fn schedule_sources_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<PassReport, SchedulerError> {
        let sources = self.store.list_sources().await?;
        let mut outcomes = Vec::with_capacity(sources.len());

        for source in sources {
            let type_key = source.type_key.clone();
            let outcome = self.schedule_source(source, now).await;
            debug!(source = %type_key, outcome = ?outcome, "Source handled");
            outcomes.push((type_key, outcome));
        }

        Ok(PassReport {
            started_at: now,
            outcomes,
        })
    }

    async fn schedule_source(&self, mut source: Source, now: DateTime<Utc>) -> SourceOutcome {
        let token = LockToken::for_source(&source.type_key, &self.owner);
        if !self.acquire(&token, &source.type_key).await {
            return SourceOutcome::LockBusy;
        }

        let cycle = AssertUnwindSafe(self.run_cycle(&mut source, now))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SchedulerError::Panicked(panic_message(panic.as_ref()))));

        let outcome = match cycle {
            Ok(Cycle::Skip(outcome)) => outcome,
            Ok(Cycle::Persist(outcome)) => self.persist(&source, outcome).await,
            Err(e) => {
                error!(source = %source.type_key, error = %e, "Scheduling failed");
                let message = e.to_string();
                source.error_message = Some(message.clone());
                self.persist(&source, SourceOutcome::Failed(message)).await
            }
        };

        if let Err(e) = self.locks.release(&token).await {
            warn!(source = %source.type_key, error = %e, "Failed to release source lock");
        }
        outcome
    }

    async fn acquire(&self, token: &LockToken, type_key: &str) -> bool {
        let attempt = self.locks.try_acquire(token, self.lock_duration);
        match tokio::time::timeout(self.lock_duration, attempt).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                info!(source = %type_key, "Could not become master, another instance holds the lock");
                false
            }
            Ok(Err(e)) => {
                warn!(source = %type_key, error = %e, "Lock coordinator error, skipping source");
                false
            }
            Err(_) => {
                warn!(source = %type_key, "Timed out acquiring source lock");
                false
            }
        }
    }

    async fn run_cycle(
        &self,
        source: &mut Source,
        now: DateTime<Utc>,
    ) -> Result<Cycle, SchedulerError> {
        *source = self.store.refresh(source).await?;
        info!(source = %source.type_key, "Scheduling source");

        if !source.active {
            info!(source = %source.type_key, "Source not active");
            return Ok(Cycle::Skip(SourceOutcome::Inactive));
        }

        self.mappings.sync(source).await?;

        if !source.is_due(now) {
            debug!(
                source = %source.type_key,
                last_scheduled = ?source.last_scheduled,
                "Nothing to do, source not due"
            );
            return Ok(Cycle::Skip(SourceOutcome::NotDue));
        }

        if let Some(last) = source.last_scheduled {
            self.telemetry.record_value(
                SINCE_LAST_SCHEDULED,
                &source.type_key,
                (now - last).num_milliseconds(),
            );
        }

        let outcome = match self.strategies.resolve(&source.scheduler_type) {
            None => {
                let message = SchedulerError::UnknownStrategy(source.scheduler_type.clone()).to_string();
                warn!(source = %source.type_key, "{}", message);
                source.error_message = Some(message.clone());
                SourceOutcome::Misconfigured(message)
            }
            Some(strategy) => {
                let current: &Source = source;
                let (items, success) = instrument(
                    self.telemetry.as_ref(),
                    SCHEDULE_DURATION,
                    &current.type_key,
                    async {
                        let result = strategy.try_schedule(current, now).await?;
                        let items = result.items.len();
                        info!(
                            source = %current.type_key,
                            success = result.success,
                            items = items,
                            "Strategy returned"
                        );
                        if result.success && items > 0 {
                            self.queue.enqueue_batch(result.items).await?;
                        }
                        Ok::<_, SchedulerError>((items, result.success))
                    },
                )
                .await?;

                source.error_message = if success {
                    None
                } else {
                    Some(format!(
                        "scheduler {} reported an unsuccessful attempt",
                        source.scheduler_type
                    ))
                };
                SourceOutcome::Scheduled { items, success }
            }
        };

        source.last_scheduled = Some(now);
        Ok(Cycle::Persist(outcome))
    }

    async fn persist(&self, source: &Source, outcome: SourceOutcome) -> SourceOutcome {
        match self.store.persist(source).await {
            Ok(()) => {
                debug!(source = %source.type_key, "Updated source");
                outcome
            }
            Err(e) => {
                error!(source = %source.type_key, error = %e, "Failed to persist source");
                SourceOutcome::Failed(format!("failed to persist source: {}", e))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
