//! Article body extraction with an ordered chain of strategies.
//!
//! Each strategy gets its own deadline. The first one producing enough text
//! wins; otherwise the article degrades to partial text, the feed snippet,
//! or an empty failed result. A failing article never affects the others.

pub mod fetch;
pub mod render;

use crate::scraper::ContentScraper;
use crate::types::{CandidateArticle, ExtractMethod, Extraction};
use crate::{NewsError, PipelineConfig, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

pub use fetch::{HttpPageFetcher, PageFetcher};
pub use render::{PageRenderer, RemoteRenderer};

/// One way of obtaining an article body.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Method recorded on articles this strategy extracts.
    fn method(&self) -> ExtractMethod;

    async fn try_extract(&self, url: &str) -> Result<String>;
}

/// Static fetch followed by HTML parsing.
pub struct StaticHtmlStrategy {
    fetcher: Arc<dyn PageFetcher>,
    scraper: ContentScraper,
}

impl StaticHtmlStrategy {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            scraper: ContentScraper::default(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for StaticHtmlStrategy {
    fn method(&self) -> ExtractMethod {
        ExtractMethod::Primary
    }

    async fn try_extract(&self, url: &str) -> Result<String> {
        let html = self.fetcher.fetch_page(url).await?;
        self.scraper.extract(&html)
    }
}

/// Rendered fetch followed by HTML parsing, for script-built pages.
pub struct RenderedHtmlStrategy {
    renderer: Arc<dyn PageRenderer>,
    scraper: ContentScraper,
}

impl RenderedHtmlStrategy {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            renderer,
            scraper: ContentScraper::default(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for RenderedHtmlStrategy {
    fn method(&self) -> ExtractMethod {
        ExtractMethod::Secondary
    }

    async fn try_extract(&self, url: &str) -> Result<String> {
        let html = self.renderer.render_page(url).await?;
        self.scraper.extract(&html)
    }
}

/// Thresholds and limits for the extractor.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorSettings {
    pub min_content_length: usize,
    pub partial_content_length: usize,
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl From<&PipelineConfig> for ExtractorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            min_content_length: config.min_content_length,
            partial_content_length: config.partial_content_length,
            timeout: config.extraction_timeout(),
            max_concurrent: config.max_concurrent_extractions.max(1),
        }
    }
}

/// The `ContentExtractor` struct runs the strategy chain for every selected article.
pub struct ContentExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    settings: ExtractorSettings,
}

impl ContentExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>, settings: ExtractorSettings) -> Self {
        Self {
            strategies,
            settings,
        }
    }

    /// Builds the standard chain: static HTML, then rendered HTML when
    /// rendering is enabled and a renderer is available.
    pub fn from_config(
        config: &PipelineConfig,
        fetcher: Arc<dyn PageFetcher>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn ExtractionStrategy>> =
            vec![Box::new(StaticHtmlStrategy::new(fetcher))];

        match renderer {
            Some(renderer) if config.enable_rendering_fallback => {
                strategies.push(Box::new(RenderedHtmlStrategy::new(renderer)));
            }
            None if config.enable_rendering_fallback => {
                warn!("Rendering fallback enabled but no renderer configured; skipping it");
            }
            _ => {}
        }

        Self::new(strategies, ExtractorSettings::from(config))
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Extracts one article, degrading through the fallback chain.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The article to extract; its snippet is the last resort.
    ///
    /// # Returns
    ///
    /// An `Extraction` describing what was obtained. This never fails.
    #[instrument(skip_all, fields(url = %candidate.url))]
    pub async fn extract(&self, candidate: &CandidateArticle) -> Extraction {
        let mut best_partial: Option<String> = None;

        for strategy in &self.strategies {
            let method = strategy.method();
            let outcome = match timeout(self.settings.timeout, strategy.try_extract(&candidate.url)).await {
                Ok(result) => result,
                Err(_) => Err(NewsError::Timeout(self.settings.timeout)),
            };

            match outcome {
                Ok(text) => {
                    let chars = text.chars().count();
                    if chars >= self.settings.min_content_length {
                        info!(%method, chars, "Extracted article body");
                        return Extraction::full(text, method);
                    }
                    debug!(%method, chars, "Extracted text too short");
                    if best_partial
                        .as_ref()
                        .map_or(true, |best| chars > best.chars().count())
                    {
                        best_partial = Some(text);
                    }
                }
                Err(e) => {
                    warn!(%method, error = %e, "Extraction strategy failed");
                }
            }
        }

        if let Some(text) = best_partial
            .filter(|t| t.chars().count() > self.settings.partial_content_length)
        {
            info!(chars = text.chars().count(), "Using partial content");
            return Extraction::full(text, ExtractMethod::Partial);
        }

        let snippet = candidate.snippet.trim();
        if !snippet.is_empty() {
            info!("Falling back to feed snippet");
            return Extraction::rss_fallback(snippet.to_string());
        }

        warn!("No content available for article");
        Extraction::failed()
    }

    /// Extracts all articles with bounded concurrency.
    ///
    /// The output has the same length and order as `candidates`.
    pub async fn extract_all(&self, candidates: &[CandidateArticle]) -> Vec<Extraction> {
        stream::iter(candidates)
            .map(|candidate| self.extract(candidate))
            .buffered(self.settings.max_concurrent)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchLanguage;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStrategy {
        method: ExtractMethod,
        pages: HashMap<String, String>,
        calls: Arc<AtomicUsize>,
    }

    impl FixedStrategy {
        fn new(method: ExtractMethod, pages: &[(&str, String)]) -> Self {
            Self {
                method,
                pages: pages
                    .iter()
                    .map(|(u, t)| (u.to_string(), t.clone()))
                    .collect(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ExtractionStrategy for FixedStrategy {
        fn method(&self) -> ExtractMethod {
            self.method
        }

        async fn try_extract(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| NewsError::ExtractionError(format!("no page for {url}")))
        }
    }

    struct SlowStrategy;

    #[async_trait]
    impl ExtractionStrategy for SlowStrategy {
        fn method(&self) -> ExtractMethod {
            ExtractMethod::Primary
        }

        async fn try_extract(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("never".repeat(100))
        }
    }

    fn settings() -> ExtractorSettings {
        ExtractorSettings {
            min_content_length: 150,
            partial_content_length: 50,
            timeout: Duration::from_millis(50),
            max_concurrent: 3,
        }
    }

    fn candidate(url: &str, snippet: &str) -> CandidateArticle {
        CandidateArticle {
            title: "t".into(),
            url: url.into(),
            source_name: "s".into(),
            published_at: Utc::now(),
            language: SearchLanguage::En,
            snippet: snippet.into(),
        }
    }

    fn long_text() -> String {
        "Full article sentence. ".repeat(10)
    }

    #[tokio::test]
    async fn primary_success_stops_the_chain() {
        let primary = FixedStrategy::new(ExtractMethod::Primary, &[("u1", long_text())]);
        let secondary = FixedStrategy::new(ExtractMethod::Secondary, &[("u1", long_text())]);
        let secondary_calls = secondary.calls.clone();
        let extractor = ContentExtractor::new(vec![Box::new(primary), Box::new(secondary)], settings());

        let result = extractor.extract(&candidate("u1", "snippet")).await;

        assert_eq!(result.method, ExtractMethod::Primary);
        assert!(result.has_full_content);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn secondary_used_when_primary_fails() {
        let primary = FixedStrategy::new(ExtractMethod::Primary, &[]);
        let secondary = FixedStrategy::new(ExtractMethod::Secondary, &[("u1", long_text())]);
        let extractor = ContentExtractor::new(vec![Box::new(primary), Box::new(secondary)], settings());

        let result = extractor.extract(&candidate("u1", "")).await;

        assert_eq!(result.method, ExtractMethod::Secondary);
        assert!(result.has_full_content);
    }

    #[tokio::test]
    async fn short_text_is_kept_as_partial() {
        let short = "x".repeat(80);
        let primary = FixedStrategy::new(ExtractMethod::Primary, &[("u1", short.clone())]);
        let extractor = ContentExtractor::new(vec![Box::new(primary)], settings());

        let result = extractor.extract(&candidate("u1", "snippet")).await;

        assert_eq!(result.method, ExtractMethod::Partial);
        assert_eq!(result.content, short);
        assert!(result.has_full_content);
    }

    #[tokio::test]
    async fn snippet_fallback_then_failed() {
        let extractor = ContentExtractor::new(
            vec![Box::new(FixedStrategy::new(ExtractMethod::Primary, &[]))],
            settings(),
        );

        let with_snippet = extractor.extract(&candidate("u1", "  feed text  ")).await;
        assert_eq!(with_snippet.method, ExtractMethod::RssFallback);
        assert_eq!(with_snippet.content, "feed text");
        assert!(!with_snippet.has_full_content);

        let without = extractor.extract(&candidate("u1", "")).await;
        assert_eq!(without.method, ExtractMethod::Failed);
        assert!(without.content.is_empty());
        assert!(!without.has_full_content);
    }

    #[tokio::test]
    async fn timeout_moves_to_next_strategy() {
        let secondary = FixedStrategy::new(ExtractMethod::Secondary, &[("u1", long_text())]);
        let extractor =
            ContentExtractor::new(vec![Box::new(SlowStrategy), Box::new(secondary)], settings());

        let result = extractor.extract(&candidate("u1", "")).await;

        assert_eq!(result.method, ExtractMethod::Secondary);
    }

    #[tokio::test]
    async fn extract_all_preserves_order_and_isolates_failures() {
        let primary = FixedStrategy::new(
            ExtractMethod::Primary,
            &[("a", long_text()), ("c", long_text())],
        );
        let extractor = ContentExtractor::new(vec![Box::new(primary)], settings());
        let candidates = vec![candidate("a", ""), candidate("b", "only snippet"), candidate("c", "")];

        let results = extractor.extract_all(&candidates).await;

        let methods: Vec<_> = results.iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            vec![ExtractMethod::Primary, ExtractMethod::RssFallback, ExtractMethod::Primary]
        );
    }

    struct CountingStrategy {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ExtractionStrategy for CountingStrategy {
        fn method(&self) -> ExtractMethod {
            ExtractMethod::Primary
        }

        async fn try_extract(&self, _url: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(long_text())
        }
    }

    #[tokio::test]
    async fn extract_all_respects_concurrency_limit() {
        let strategy = Arc::new(CountingStrategy {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });

        struct Shared(Arc<CountingStrategy>);

        #[async_trait]
        impl ExtractionStrategy for Shared {
            fn method(&self) -> ExtractMethod {
                self.0.method()
            }

            async fn try_extract(&self, url: &str) -> Result<String> {
                self.0.try_extract(url).await
            }
        }

        let extractor =
            ContentExtractor::new(vec![Box::new(Shared(strategy.clone()))], settings());
        let candidates: Vec<_> = (0..10).map(|i| candidate(&format!("u{i}"), "")).collect();

        let results = extractor.extract_all(&candidates).await;

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.method == ExtractMethod::Primary));
        let peak = strategy.peak.load(Ordering::SeqCst);
        assert!(peak <= settings().max_concurrent, "peak concurrency {peak}");
        assert!(peak > 1, "extractions never overlapped");
    }

    #[test]
    fn rendering_strategy_requires_flag_and_renderer() {
        struct NoPages;

        #[async_trait]
        impl PageFetcher for NoPages {
            async fn fetch_page(&self, _url: &str) -> Result<String> {
                Err(NewsError::ExtractionError("offline".into()))
            }
        }

        #[async_trait]
        impl PageRenderer for NoPages {
            async fn render_page(&self, _url: &str) -> Result<String> {
                Err(NewsError::ExtractionError("offline".into()))
            }
        }

        let mut config = PipelineConfig::default();
        let renderer: Arc<dyn PageRenderer> = Arc::new(NoPages);

        let off = ContentExtractor::from_config(&config, Arc::new(NoPages), Some(renderer.clone()));
        assert_eq!(off.strategy_count(), 1);

        config.enable_rendering_fallback = true;
        let on = ContentExtractor::from_config(&config, Arc::new(NoPages), Some(renderer));
        assert_eq!(on.strategy_count(), 2);

        let missing = ContentExtractor::from_config(&config, Arc::new(NoPages), None);
        assert_eq!(missing.strategy_count(), 1);
    }
}
