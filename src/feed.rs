use crate::query::SearchQuery;
use crate::types::CandidateArticle;
use crate::{NewsError, PipelineConfig, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Google News RSS search endpoint.
pub const GOOGLE_NEWS_RSS_BASE: &str = "https://news.google.com/rss/search";

/// A raw feed item, before any cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub pub_date: Option<String>,
    pub description: Option<String>,
    pub source_name: Option<String>,
}

/// Network access to a news feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self, query: &SearchQuery) -> Result<Vec<FeedEntry>>;
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text", default)]
    name: String,
}

/// Parses an RSS 2.0 document into feed entries.
///
/// Items without a title or link are kept here and dropped later, when they
/// are turned into candidates.
pub fn parse_rss(xml: &str) -> Result<Vec<FeedEntry>> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&cleaned).map_err(|e| NewsError::FeedParseError(e.to_string()))?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|item| FeedEntry {
            title: item.title.unwrap_or_default(),
            link: item.link.unwrap_or_default(),
            pub_date: item.pub_date,
            description: item.description,
            source_name: item
                .source
                .map(|s| s.name.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
        .collect())
}

// HTML entities that are not defined in XML but show up in real feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// The `GoogleNewsFeed` struct queries the Google News RSS search endpoint.
pub struct GoogleNewsFeed {
    /// The HTTP client used for making requests.
    client: Client,
    /// Endpoint to query, overridable for tests.
    base_url: String,
}

impl GoogleNewsFeed {
    /// Creates a new `GoogleNewsFeed` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the user agent and feed timeout.
    ///
    /// # Returns
    ///
    /// A `Result` containing the feed, or an error if the client could not be created.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Self::with_base_url(config, GOOGLE_NEWS_RSS_BASE)
    }

    pub fn with_base_url(config: &PipelineConfig, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.feed_timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Builds the search URL for one query.
    pub fn feed_url(&self, query: &SearchQuery) -> String {
        let (hl, gl, ceid) = query.language.edition();
        format!(
            "{}?q={}&hl={}&gl={}&ceid={}",
            self.base_url,
            urlencoding::encode(&query.keyword),
            hl,
            gl,
            urlencoding::encode(ceid)
        )
    }
}

#[async_trait]
impl FeedSource for GoogleNewsFeed {
    #[instrument(skip(self), fields(keyword = %query.keyword, language = %query.language))]
    async fn fetch_feed(&self, query: &SearchQuery) -> Result<Vec<FeedEntry>> {
        let url = self.feed_url(query);
        debug!("Feed URL: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/rss+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let status = response.status();
        debug!("Response status: {}", status);
        if !status.is_success() {
            return Err(NewsError::SourceUnavailable(format!(
                "feed for '{}' ({}) returned HTTP {}",
                query.keyword, query.language, status
            )));
        }

        let body = response.text().await?;
        let entries = parse_rss(&body)?;
        info!(count = entries.len(), "Parsed feed entries");
        Ok(entries)
    }
}

/// Candidates gathered from every search query of a run.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// One list per search query, in query order.
    pub batches: Vec<Vec<CandidateArticle>>,
    /// One message per branch that could not be fetched.
    pub warnings: Vec<String>,
}

impl FetchOutcome {
    pub fn total(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// Turns feed entries into candidates and keeps one failing branch from
/// affecting the others.
pub struct SourceFetcher {
    source: Arc<dyn FeedSource>,
}

impl SourceFetcher {
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self { source }
    }

    /// Fetches one branch. A failure yields an empty list plus a warning.
    pub async fn fetch(&self, query: &SearchQuery) -> (Vec<CandidateArticle>, Option<String>) {
        match self.source.fetch_feed(query).await {
            Ok(entries) => {
                let total = entries.len();
                let candidates: Vec<_> = entries
                    .into_iter()
                    .filter_map(|entry| to_candidate(entry, query))
                    .collect();
                debug!(
                    total,
                    kept = candidates.len(),
                    language = %query.language,
                    "Converted feed entries"
                );
                (candidates, None)
            }
            Err(e) => {
                let err = match e {
                    e @ NewsError::SourceUnavailable(_) => e,
                    other => NewsError::SourceUnavailable(format!(
                        "{} feed for '{}': {}",
                        query.language, query.keyword, other
                    )),
                };
                warn!(error = %err, "Feed branch failed; continuing without it");
                (Vec::new(), Some(err.to_string()))
            }
        }
    }

    /// Fetches all branches concurrently and gathers them in query order.
    #[instrument(skip_all, fields(branches = queries.len()))]
    pub async fn fetch_all(&self, queries: &[SearchQuery]) -> FetchOutcome {
        let results = join_all(queries.iter().map(|q| self.fetch(q))).await;

        let mut outcome = FetchOutcome::default();
        for (candidates, warning) in results {
            outcome.batches.push(candidates);
            outcome.warnings.extend(warning);
        }
        info!(
            candidates = outcome.total(),
            failed_branches = outcome.warnings.len(),
            "Fetched feed candidates"
        );
        outcome
    }
}

fn to_candidate(entry: FeedEntry, query: &SearchQuery) -> Option<CandidateArticle> {
    let raw_title = entry.title.trim();
    let link = entry.link.trim();
    if raw_title.is_empty() || link.is_empty() {
        return None;
    }

    let Some(published_at) = entry.pub_date.as_deref().and_then(parse_pub_date) else {
        debug!(title = raw_title, "Skipping entry without a usable publish date");
        return None;
    };

    let (title, title_source) = split_title_source(raw_title);
    let source_name = entry
        .source_name
        .or(title_source)
        .unwrap_or_default();

    Some(CandidateArticle {
        title,
        url: resolve_original_url(link),
        source_name,
        published_at,
        language: query.language,
        snippet: entry
            .description
            .as_deref()
            .map(clean_snippet)
            .unwrap_or_default(),
    })
}

/// Parses an RSS `pubDate` (RFC 2822), accepting RFC 3339 as well.
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Splits Google News titles of the form `Headline - Publisher`.
pub fn split_title_source(title: &str) -> (String, Option<String>) {
    match title.rsplit_once(" - ") {
        Some((headline, source)) if !headline.trim().is_empty() && !source.trim().is_empty() => {
            (headline.trim().to_string(), Some(source.trim().to_string()))
        }
        _ => (title.trim().to_string(), None),
    }
}

/// Unwraps Google redirect links that carry the target in a `url` parameter.
pub fn resolve_original_url(link: &str) -> String {
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };
    let is_google_news = parsed
        .host_str()
        .is_some_and(|host| host.ends_with("news.google.com"));
    if !is_google_news {
        return link.to_string();
    }

    parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| link.to_string())
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strips tags and entities from an item description and collapses whitespace.
pub fn clean_snippet(description: &str) -> String {
    let decoded = html_escape::decode_html_entities(description);
    let no_tags = RE_TAGS.replace_all(&decoded, " ");
    let decoded_again = html_escape::decode_html_entities(&no_tags);
    RE_WS.replace_all(&decoded_again, " ").trim().to_string()
}
