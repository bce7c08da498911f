use crate::{NewsError, PipelineConfig, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Network access to an article page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the raw HTML of `url`.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// The `HttpPageFetcher` struct downloads article pages with browser-like headers.
pub struct HttpPageFetcher {
    /// The HTTP client used for making requests.
    client: Client,
    /// Transport attempts per page.
    max_attempts: u32,
    /// Delay before the first retry; doubles afterwards.
    retry_delay: Duration,
}

impl HttpPageFetcher {
    /// Creates a new `HttpPageFetcher` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the user agent, timeout, and attempt count.
    ///
    /// # Returns
    ///
    /// A `Result` containing the fetcher, or an error if the client could not be created.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.extraction_timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            max_attempts: config.max_fetch_attempts.max(1),
            retry_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Attempts to fetch a page once.
    async fn try_fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::ExtractionError(format!("HTTP {status} for {url}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(NewsError::ExtractionError(format!(
                "non-HTML content type '{content_type}' for {url}"
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    /// Fetches a page, retrying transport errors with exponential backoff.
    ///
    /// HTTP status and content-type rejections are final and not retried.
    async fn fetch_page(&self, url: &str) -> Result<String> {
        debug!("Fetching page: {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_fetch_page(url).await {
                Ok(html) => return Ok(html),
                Err(NewsError::RequestError(e)) if attempt < self.max_attempts => {
                    let delay = backoff_delay(self.retry_delay, attempt);
                    warn!(%url, attempt, error = %e, ?delay, "Page fetch failed; retrying");
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`, saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}
