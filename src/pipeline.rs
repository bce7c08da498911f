use crate::config::SourceKind;
use crate::extract::{ContentExtractor, HttpPageFetcher, PageRenderer, RemoteRenderer};
use crate::feed::{FeedSource, GoogleNewsFeed, SourceFetcher};
use crate::filter::select_candidates;
use crate::notify::{MailSender, Notifier, SmtpMailer};
use crate::query::{validate_recipient, Query, QueryParams};
use crate::search::GoogleSearchFeed;
use crate::summarize::Summarizer;
use crate::types::{EnrichedArticle, RunResult, RunState};
use crate::{PipelineConfig, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Source of the current time for a run.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// One digest request: what to search for and where to send the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(flatten)]
    pub params: QueryParams,
    pub recipient: String,
}

/// The `Pipeline` struct sequences one run from query validation to notification.
///
/// A pipeline holds no per-run state, so a single instance can serve any
/// number of runs, concurrently or not.
pub struct Pipeline {
    config: PipelineConfig,
    offset: FixedOffset,
    fetcher: SourceFetcher,
    extractor: ContentExtractor,
    summarizer: Summarizer,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn FeedSource>,
        extractor: ContentExtractor,
        summarizer: Summarizer,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        let offset = config.reference_offset();
        Self {
            fetcher: SourceFetcher::new(source),
            notifier: Notifier::new(mailer, offset),
            extractor,
            summarizer,
            offset,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Builds a pipeline backed by the configured search source, HTTP
    /// extraction, and SMTP.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let source: Arc<dyn FeedSource> = match config.source {
            SourceKind::GoogleNews => Arc::new(GoogleNewsFeed::new(&config)?),
            SourceKind::GoogleSearch => Arc::new(GoogleSearchFeed::new(&config)?),
        };
        let fetcher = Arc::new(HttpPageFetcher::new(&config)?);
        let renderer: Option<Arc<dyn PageRenderer>> = match &config.render_endpoint {
            Some(endpoint) => Some(Arc::new(RemoteRenderer::new(&config, endpoint.as_str())?)),
            None => None,
        };
        let extractor = ContentExtractor::from_config(&config, fetcher, renderer);
        let summarizer = Summarizer::from_config(&config);
        let mailer = Arc::new(SmtpMailer::new(config.smtp.clone()));

        Ok(Self::new(config, source, extractor, summarizer, mailer))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the digest end to end.
    ///
    /// # Arguments
    ///
    /// * `request` - Search parameters and the digest recipient.
    ///
    /// # Returns
    ///
    /// The `RunResult`. The only error is `NewsError::InvalidQuery`, raised
    /// before any network activity; every later failure degrades into the result.
    #[instrument(skip_all, fields(keyword = %request.params.keyword))]
    pub async fn run(&self, request: RunRequest) -> Result<RunResult> {
        let now = self.clock.now();
        let mut progress = RunProgress::start();

        let query = match Query::build(&request.params, now, &self.offset)
            .and_then(|query| validate_recipient(&request.recipient).map(|()| query))
        {
            Ok(query) => query,
            Err(e) => {
                progress.advance(RunState::Errored);
                warn!(error = %e, "Rejected run");
                return Err(e);
            }
        };

        progress.advance(RunState::Fetching);
        let fetched = self.fetcher.fetch_all(&query.search_queries()).await;
        let warnings = fetched.warnings;

        progress.advance(RunState::Filtering);
        let selected = select_candidates(
            fetched.batches,
            &query.window,
            query.requested_count as usize,
            self.config.merge_strategy,
        );

        progress.advance(RunState::Extracting);
        let extractions = self.extractor.extract_all(&selected).await;

        progress.advance(RunState::Summarizing);
        let texts: Vec<&str> = extractions.iter().map(|e| e.content.as_str()).collect();
        let summaries = self
            .summarizer
            .summarize_all(&texts, self.config.max_concurrent_extractions)
            .await;

        let articles: Vec<EnrichedArticle> = selected
            .into_iter()
            .zip(extractions)
            .zip(summaries)
            .map(|((candidate, extraction), summary)| {
                EnrichedArticle::new(candidate, extraction, summary)
            })
            .collect();

        let actual_count = articles.len() as u32;
        let note = shortfall_note(actual_count, query.requested_count);

        progress.advance(RunState::Notifying);
        let email_status = self
            .notifier
            .notify(&request.recipient, &query, &articles, note.as_deref(), now)
            .await;

        progress.advance(RunState::Complete);
        info!(
            requested = query.requested_count,
            actual = actual_count,
            email_sent = email_status.success,
            warnings = warnings.len(),
            "Run complete"
        );

        Ok(RunResult {
            articles,
            requested_count: query.requested_count,
            actual_count,
            email_status,
            note,
            warnings,
        })
    }
}

/// Explains why a run returned fewer articles than requested.
pub fn shortfall_note(actual: u32, requested: u32) -> Option<String> {
    if actual == 0 {
        Some("No matching articles found for this keyword and date range".to_string())
    } else if actual < requested {
        Some(format!(
            "Only {actual} matching articles found, fewer than the requested {requested}"
        ))
    } else {
        None
    }
}

/// Tracks the run state and logs every transition.
struct RunProgress {
    state: RunState,
}

impl RunProgress {
    fn start() -> Self {
        Self {
            state: RunState::Validating,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            is_valid_transition(self.state, next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        info!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }
}

fn is_valid_transition(from: RunState, to: RunState) -> bool {
    use RunState::*;
    matches!(
        (from, to),
        (Validating, Fetching)
            | (Validating, Errored)
            | (Fetching, Filtering)
            | (Filtering, Extracting)
            | (Extracting, Summarizing)
            | (Summarizing, Notifying)
            | (Notifying, Complete)
    )
}
