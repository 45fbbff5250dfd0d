use crate::source::Source;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("source '{source_key}' has invalid property {name}='{value}'")]
    InvalidProperty {
        source_key: String,
        name: String,
        value: String,
    },

    #[error("scheduling failed: {0}")]
    Failed(String),
}

/// Unit of work handed to downstream fetchers. The master scheduler never
/// looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub source: String,
    pub kind: String,
    pub payload: serde_json::Value,
}

impl WorkItem {
    pub fn new(source: &str, kind: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            kind: kind.to_string(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleResult {
    pub items: Vec<WorkItem>,
    pub success: bool,
}

impl ScheduleResult {
    pub fn success(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            success: true,
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }
}

/// Per-source-kind scheduling strategy.
#[async_trait]
pub trait SourceScheduler: Send + Sync {
    async fn try_schedule(
        &self,
        source: &Source,
        now: DateTime<Utc>,
    ) -> Result<ScheduleResult, StrategyError>;
}

pub type StrategyFactory = Arc<dyn Fn() -> Arc<dyn SourceScheduler> + Send + Sync>;

/// Strategies by the identifier sources carry in `scheduler_type`.
/// Populated once at startup.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(super::windowed::WINDOWED, || {
            Arc::new(super::windowed::WindowedScheduler::new())
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn SourceScheduler> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn SourceScheduler>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
