use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateResponse {
    pub ok: bool,
    pub status: u16,
    /// `None` when the response carried no body.
    pub body: Option<String>,
}

/// Fetches mapping templates from wherever they are published.
#[async_trait]
pub trait TemplateFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<TemplateResponse, FetchError>;
}

/// Unauthenticated HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpTemplateFetcher {
    client: reqwest::Client,
}

impl HttpTemplateFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TemplateFetcher for HttpTemplateFetcher {
    async fn get(&self, url: &str) -> Result<TemplateResponse, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(TemplateResponse {
            ok: status.is_success(),
            status: status.as_u16(),
            body: if body.is_empty() { None } else { Some(body) },
        })
    }
}
