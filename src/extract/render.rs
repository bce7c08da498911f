use crate::{NewsError, PipelineConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

/// JavaScript-rendering access to an article page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Returns the HTML of `url` after scripts have run.
    async fn render_page(&self, url: &str) -> Result<String>;
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
}

/// Renders pages through a headless-browser service that accepts
/// `POST {"url": ...}` and answers with the final HTML.
pub struct RemoteRenderer {
    client: Client,
    endpoint: String,
}

impl RemoteRenderer {
    pub fn new(config: &PipelineConfig, endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.extraction_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PageRenderer for RemoteRenderer {
    async fn render_page(&self, url: &str) -> Result<String> {
        debug!(%url, endpoint = %self.endpoint, "Rendering page");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RenderRequest { url })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::ExtractionError(format!(
                "renderer returned HTTP {status} for {url}"
            )));
        }

        Ok(response.text().await?)
    }
}
