pub mod mapping;
pub mod template;

pub use mapping::{MappingError, MappingSynchronizer, TYPE_NAME_PLACEHOLDER};
pub use template::{FetchError, HttpTemplateFetcher, TemplateFetcher, TemplateResponse};

use crate::parser::{ParserError, RecordStream};
use crate::source::Source;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Request(String),

    #[error("index '{index}' rejected request with status {status}: {message}")]
    Rejected {
        index: String,
        status: u16,
        message: String,
    },

    #[error("record stream failed: {0}")]
    Records(#[from] ParserError),
}

/// Search index operations the core relies on.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Creates `index` unless it already exists.
    async fn ensure_index(&self, url: &str, index: &str) -> Result<(), IndexError>;

    async fn mapping_exists(&self, url: &str, index: &str, type_key: &str)
        -> Result<bool, IndexError>;

    async fn upsert_mapping(
        &self,
        url: &str,
        index: &str,
        type_key: &str,
        mapping: &str,
    ) -> Result<(), IndexError>;

    /// Drains `records` into the source's indices, returning how many were pushed.
    /// A record stream error fails the whole push.
    async fn push_batch(&self, records: RecordStream, source: &Source) -> Result<usize, IndexError>;
}
