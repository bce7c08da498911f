use crate::config::GoogleSearchConfig;
use crate::feed::{FeedEntry, FeedSource};
use crate::query::SearchQuery;
use crate::types::SearchLanguage;
use crate::{NewsError, PipelineConfig, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Google Custom Search JSON API endpoint.
pub const CUSTOM_SEARCH_API: &str = "https://www.googleapis.com/customsearch/v1";

/// Metatags that may carry a publish time, in order of preference.
const DATE_METATAGS: [&str; 4] = ["article:published_time", "og:updated_time", "date", "pubdate"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pagemap: PageMap,
}

#[derive(Debug, Default, Deserialize)]
struct PageMap {
    #[serde(default)]
    metatags: Vec<Map<String, Value>>,
    #[serde(default)]
    newsarticle: Vec<Map<String, Value>>,
}

/// The `GoogleSearchFeed` struct queries the Custom Search API as an
/// alternative to the news RSS feed.
pub struct GoogleSearchFeed {
    client: Client,
    settings: GoogleSearchConfig,
    base_url: String,
}

impl GoogleSearchFeed {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Self::with_base_url(config, CUSTOM_SEARCH_API)
    }

    pub fn with_base_url(config: &PipelineConfig, base_url: impl Into<String>) -> Result<Self> {
        if !config.google_search.is_configured() {
            warn!("Custom Search credentials are not set; searches will fail");
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.feed_timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            settings: config.google_search.clone(),
            base_url: base_url.into(),
        })
    }

    fn query_params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let (lr, gl, hl, suffix) = match query.language {
            SearchLanguage::Zh => ("lang_zh-TW", "tw", "zh-TW", "新聞"),
            SearchLanguage::En => ("lang_en", "us", "en", "news"),
        };

        let mut params = vec![
            ("key", self.settings.api_key.clone()),
            ("cx", self.settings.engine_id.clone()),
            ("q", format!("{} {}", query.keyword, suffix)),
            ("num", self.settings.max_results.clamp(1, 10).to_string()),
            ("lr", lr.to_string()),
            ("gl", gl.to_string()),
            ("hl", hl.to_string()),
            ("sort", "date".to_string()),
        ];
        if !self.settings.date_restrict.is_empty() {
            params.push(("dateRestrict", self.settings.date_restrict.clone()));
        }
        params
    }
}

#[async_trait]
impl FeedSource for GoogleSearchFeed {
    #[instrument(skip(self), fields(keyword = %query.keyword, language = %query.language))]
    async fn fetch_feed(&self, query: &SearchQuery) -> Result<Vec<FeedEntry>> {
        if !self.settings.is_configured() {
            return Err(NewsError::SourceUnavailable(
                "Custom Search API key or engine id is not configured".to_string(),
            ));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(query))
            .send()
            .await?;

        let status = response.status();
        debug!("Response status: {}", status);
        if status == StatusCode::FORBIDDEN {
            return Err(NewsError::SourceUnavailable(
                "Custom Search quota exhausted or API key rejected".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(NewsError::SourceUnavailable(format!(
                "Custom Search for '{}' ({}) returned HTTP {}",
                query.keyword, query.language, status
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| NewsError::FeedParseError(e.to_string()))?;
        let entries: Vec<_> = body.items.into_iter().filter_map(to_entry).collect();
        info!(count = entries.len(), "Parsed search results");
        Ok(entries)
    }
}

fn to_entry(item: SearchItem) -> Option<FeedEntry> {
    let title = item.title.trim();
    if title.is_empty() || item.link.is_empty() {
        return None;
    }

    let pub_date = item.pagemap.metatags.first().and_then(|tags| {
        DATE_METATAGS
            .iter()
            .find_map(|key| tags.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    });

    let source_name = item
        .pagemap
        .newsarticle
        .first()
        .and_then(|article| article.get("source").and_then(Value::as_str))
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| host_name(&item.link));

    Some(FeedEntry {
        title: title.to_string(),
        link: item.link,
        pub_date,
        description: Some(item.snippet).filter(|s| !s.is_empty()),
        source_name,
    })
}

fn host_name(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}
