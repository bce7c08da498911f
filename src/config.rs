use crate::Result;
use ::config::{Config, Environment, File};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `NEWS_DIGEST__MAX_CONCURRENT_EXTRACTIONS=5`.
/// Nested keys use the same separator: `NEWS_DIGEST__SMTP__USER`.
pub const ENV_PREFIX: &str = "NEWS_DIGEST";

/// The `PipelineConfig` struct holds the settings for one pipeline instance.
///
/// It is passed to the pipeline at construction and never mutated afterwards,
/// so two pipelines built from equal configs behave identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Try the rendered-page strategy after the static one fails.
    pub enable_rendering_fallback: bool,
    /// Endpoint of the headless-browser service used for rendering.
    pub render_endpoint: Option<String>,
    /// The number of article extractions allowed to run at once.
    pub max_concurrent_extractions: usize,
    /// Deadline for one extraction strategy on one article.
    pub extraction_timeout_secs: u64,
    /// Deadline for one feed request.
    pub feed_timeout_secs: u64,
    /// Transport attempts for one page fetch.
    pub max_fetch_attempts: u32,
    /// The user agent string to be used in HTTP requests.
    pub user_agent: String,
    /// Minimum extracted length for an article to count as fully extracted.
    pub min_content_length: usize,
    /// Minimum extracted length for short text to be kept as partial content.
    pub partial_content_length: usize,
    /// Bounds of the placeholder summary, in characters.
    pub summary_length_range: SummaryRange,
    /// How per-language feed results are merged before truncation.
    pub merge_strategy: MergeStrategy,
    /// Offset of the reference timezone used for date windows.
    pub utc_offset_hours: i32,
    /// Optional LLM backend for summaries.
    pub llm_config: Option<LLMConfig>,
    /// Outgoing mail settings.
    pub smtp: SmtpConfig,
    /// Which search backend supplies candidates.
    pub source: SourceKind,
    /// Credentials for the Custom Search backend.
    pub google_search: GoogleSearchConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Google News RSS search.
    #[default]
    GoogleNews,
    /// Google Custom Search JSON API.
    GoogleSearch,
}

/// Google Custom Search settings. Requests fail fast while either key is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSearchConfig {
    pub api_key: String,
    /// Programmable Search Engine id (`cx`).
    pub engine_id: String,
    /// Value of the `dateRestrict` parameter, e.g. `d1` or `w1`.
    pub date_restrict: String,
    /// Results per request; the API caps this at 10.
    pub max_results: u32,
}

impl Default for GoogleSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            engine_id: String::new(),
            date_restrict: String::from("d7"),
            max_results: 10,
        }
    }
}

impl GoogleSearchConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.engine_id.is_empty()
    }
}

/// Inclusive character bounds for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRange {
    pub min: usize,
    pub max: usize,
}

impl Default for SummaryRange {
    fn default() -> Self {
        Self { min: 450, max: 600 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// All results of the first language branch, then the next.
    #[default]
    Grouped,
    /// Round-robin across language branches.
    Interleaved,
    /// Stable sort by publish time, newest first.
    NewestFirst,
}

/// The `LLMConfig` struct holds the configuration settings for the Language Model (LLM).
/// It includes the endpoint URL, model, temperature, and maximum number of tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// The endpoint URL for the LLM API.
    pub endpoint: String,
    /// The model name sent with every request.
    pub model: String,
    /// The temperature setting for the LLM, controlling the randomness of the output.
    pub temperature: f32,
    /// The maximum number of tokens allowed in the LLM response.
    pub max_tokens: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://localhost:11434/api/generate"),
            model: String::from("llama3.2:latest"),
            temperature: 0.1,
            max_tokens: 512,
        }
    }
}

/// SMTP relay settings. Delivery is reported as failed while `user` or
/// `password` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Sender address; falls back to `user` when empty.
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::from("smtp.gmail.com"),
            port: 587,
            user: String::new(),
            password: String::new(),
            from: String::new(),
        }
    }
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}

impl Default for PipelineConfig {
    /// Provides default values for the `PipelineConfig` struct.
    ///
    /// # Returns
    ///
    /// A `PipelineConfig` instance with default settings.
    fn default() -> Self {
        Self {
            enable_rendering_fallback: false,
            render_endpoint: None,
            max_concurrent_extractions: crate::DEFAULT_CONCURRENT_EXTRACTIONS,
            extraction_timeout_secs: crate::DEFAULT_EXTRACTION_TIMEOUT.as_secs(),
            feed_timeout_secs: crate::DEFAULT_FEED_TIMEOUT.as_secs(),
            max_fetch_attempts: crate::DEFAULT_MAX_FETCH_ATTEMPTS,
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
            min_content_length: crate::DEFAULT_MIN_CONTENT_LENGTH,
            partial_content_length: crate::DEFAULT_PARTIAL_CONTENT_LENGTH,
            summary_length_range: SummaryRange::default(),
            merge_strategy: MergeStrategy::default(),
            utc_offset_hours: crate::DEFAULT_UTC_OFFSET_HOURS,
            llm_config: None,
            smtp: SmtpConfig::default(),
            source: SourceKind::default(),
            google_search: GoogleSearchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration from defaults, an optional file, and the environment.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional TOML/YAML/JSON file; the format follows the extension.
    ///
    /// # Returns
    ///
    /// A `Result` containing the merged `PipelineConfig`, or a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    /// The reference timezone. Out-of-range offsets fall back to UTC+8.
    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600))
            .or_else(|| FixedOffset::east_opt(crate::DEFAULT_UTC_OFFSET_HOURS * 3600))
            .unwrap_or_else(|| Utc.fix())
    }
}
