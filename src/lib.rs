use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod extract;
pub mod feed;
pub mod filter;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod scraper;
pub mod search;
pub mod summarize;
pub mod types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, RunRequest};
pub use types::{CandidateArticle, EmailStatus, EnrichedArticle, ExtractMethod, RunResult};

/// The `NewsError` enum represents the errors that can occur while running the digest pipeline.
///
/// Only `InvalidQuery` ever escapes a run; every other variant is recovered
/// inside the stage that produced it.
#[derive(Error, Debug)]
pub enum NewsError {
    /// The caller supplied malformed parameters.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// Represents an error that occurs during an HTTP request.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// A feed query could not be served.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    /// The feed body was not a readable RSS document.
    #[error("Feed parsing failed: {0}")]
    FeedParseError(String),
    /// Represents an error that occurs during content extraction.
    #[error("Content extraction failed: {0}")]
    ExtractionError(String),
    /// An extraction strategy ran past its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// Represents an error that occurs during LLM processing.
    #[error("LLM processing failed: {0}")]
    LLMError(String),
    /// The mail transport rejected or could not deliver the message.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
    /// Configuration could not be assembled.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
}

/// A type alias for `Result` with the `NewsError` error type.
pub type Result<T> = std::result::Result<T, NewsError>;

// Constants

/// The default per-strategy extraction timeout.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(15);
/// The default timeout for a single feed request.
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);
/// The default number of simultaneous article extractions.
pub const DEFAULT_CONCURRENT_EXTRACTIONS: usize = 3;
/// The default number of transport attempts for one page fetch.
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 2;
/// Extracted text shorter than this is not treated as a full article.
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 150;
/// Extracted text longer than this is still kept as partial content.
pub const DEFAULT_PARTIAL_CONTENT_LENGTH: usize = 50;
/// Upper bound on the number of articles per run.
pub const MAX_REQUESTED_COUNT: u32 = 20;
/// Asia/Taipei, which has no daylight saving time.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;
