use super::template::{FetchError, TemplateFetcher};
use super::{IndexClient, IndexError};
use crate::source::Source;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Token in a mapping template that is replaced with the source's type key.
pub const TYPE_NAME_PLACEHOLDER: &str = "___type_name___";

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("failed to fetch mapping template: {0}")]
    Fetch(#[from] FetchError),

    #[error("mapping template '{url}' returned no body (status {status})")]
    EmptyTemplate { url: String, status: u16 },

    #[error("mapping template '{url}' returned status {status}: {body}")]
    TemplateRejected { url: String, status: u16, body: String },
}

/// Makes sure every index a source writes to exists and carries the
/// source's type mapping before any data reaches it.
pub struct MappingSynchronizer {
    index: Arc<dyn IndexClient>,
    fetcher: Arc<dyn TemplateFetcher>,
    index_url: String,
    mappings_path: String,
}

impl MappingSynchronizer {
    pub fn new(
        index: Arc<dyn IndexClient>,
        fetcher: Arc<dyn TemplateFetcher>,
        index_url: impl Into<String>,
        mappings_path: impl Into<String>,
    ) -> Self {
        Self {
            index,
            fetcher,
            index_url: index_url.into(),
            mappings_path: mappings_path.into(),
        }
    }

    pub fn template_url(&self, source: &Source) -> String {
        format!("{}{}.json", self.mappings_path, source.mapping_name())
    }

    pub async fn sync(&self, source: &Source) -> Result<(), MappingError> {
        for index_name in &source.index_names {
            self.index.ensure_index(&self.index_url, index_name).await?;

            if self
                .index
                .mapping_exists(&self.index_url, index_name, &source.type_key)
                .await?
            {
                debug!(source = %source.type_key, index = %index_name, "Mapping already present");
                continue;
            }

            let mapping = self.fetch_mapping(source).await?;
            self.index
                .upsert_mapping(&self.index_url, index_name, &source.type_key, &mapping)
                .await?;
            info!(source = %source.type_key, index = %index_name, "Uploaded mapping");
        }

        debug!(source = %source.type_key, "Finished mapping setup");
        Ok(())
    }

    async fn fetch_mapping(&self, source: &Source) -> Result<String, MappingError> {
        let url = self.template_url(source);
        let response = self.fetcher.get(&url).await?;

        let Some(body) = response.body else {
            return Err(MappingError::EmptyTemplate {
                url,
                status: response.status,
            });
        };
        if !response.ok {
            return Err(MappingError::TemplateRejected {
                url,
                status: response.status,
                body,
            });
        }

        Ok(body.replace(TYPE_NAME_PLACEHOLDER, &source.type_key))
    }
}
