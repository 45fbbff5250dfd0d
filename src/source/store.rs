use super::types::Source;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("store error: {0}")]
    Generic(String),
}

/// Where sources are listed from and written back to.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<Source>, StoreError>;

    /// Returns the latest stored version of `source`.
    async fn refresh(&self, source: &Source) -> Result<Source, StoreError>;

    async fn persist(&self, source: &Source) -> Result<(), StoreError>;
}

/// Process-local store, seeded from the config file.
#[derive(Debug, Default)]
pub struct InMemorySourceStore {
    sources: RwLock<BTreeMap<String, Source>>,
}

impl InMemorySourceStore {
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.type_key.clone(), source))
            .collect();
        Self {
            sources: RwLock::new(sources),
        }
    }

    pub async fn get(&self, type_key: &str) -> Option<Source> {
        self.sources.read().await.get(type_key).cloned()
    }

    /// Replaces a source wholesale, as an external configuration refresh would.
    pub async fn upsert(&self, source: Source) {
        self.sources
            .write()
            .await
            .insert(source.type_key.clone(), source);
    }
}

#[async_trait]
impl ConfigurationStore for InMemorySourceStore {
    async fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        Ok(self.sources.read().await.values().cloned().collect())
    }

    async fn refresh(&self, source: &Source) -> Result<Source, StoreError> {
        self.get(&source.type_key)
            .await
            .ok_or_else(|| StoreError::UnknownSource(source.type_key.clone()))
    }

    async fn persist(&self, source: &Source) -> Result<(), StoreError> {
        let mut sources = self.sources.write().await;
        match sources.get_mut(&source.type_key) {
            Some(stored) => {
                *stored = source.clone();
                Ok(())
            }
            None => Err(StoreError::UnknownSource(source.type_key.clone())),
        }
    }
}
