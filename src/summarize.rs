use crate::config::SummaryRange;
use crate::llm::LLMProcessor;
use crate::prompt::PromptBuilder;
use crate::{PipelineConfig, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use tracing::{info, warn};

/// Summary used when there is no usable text at all.
pub const NO_SUMMARY: &str = "Summary unavailable. Open the article link to read the original.";

/// Text shorter than this (in characters) is not summarized.
const MIN_SUMMARIZABLE_CHARS: usize = 20;

const SENTENCE_ENDS_CJK: [char; 3] = ['。', '！', '？'];
const SENTENCE_ENDS_LATIN: [char; 3] = ['.', '!', '?'];
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '。', '，', '；', '：', '！', '？'];

/// A way of turning article text into a summary.
#[async_trait]
pub trait SummaryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, text: &str, range: SummaryRange) -> Result<String>;
}

/// Leading-text summary cut at a sentence or word boundary.
pub struct TruncatingSummary;

#[async_trait]
impl SummaryStrategy for TruncatingSummary {
    fn name(&self) -> &'static str {
        "truncate"
    }

    async fn summarize(&self, text: &str, range: SummaryRange) -> Result<String> {
        Ok(truncate_summary(text, range))
    }
}

/// Summary written by a language model.
pub struct LlmSummary {
    llm: LLMProcessor,
}

impl LlmSummary {
    pub fn new(llm: LLMProcessor) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SummaryStrategy for LlmSummary {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn summarize(&self, text: &str, range: SummaryRange) -> Result<String> {
        let prompt = PromptBuilder::summary(range.max).with_content(text).build();
        let answer = self.llm.process(&prompt).await?;
        Ok(truncate_summary(&normalize(&answer), range))
    }
}

/// The `Summarizer` struct applies the configured strategy and falls back to
/// truncation whenever that strategy fails.
pub struct Summarizer {
    strategy: Box<dyn SummaryStrategy>,
    range: SummaryRange,
}

impl Summarizer {
    pub fn new(strategy: Box<dyn SummaryStrategy>, range: SummaryRange) -> Self {
        Self { strategy, range }
    }

    pub fn truncating(range: SummaryRange) -> Self {
        Self::new(Box::new(TruncatingSummary), range)
    }

    /// Uses the LLM strategy when `llm_config` is set, truncation otherwise.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let range = config.summary_length_range;
        match &config.llm_config {
            Some(llm) => {
                info!(model = %llm.model, "LLM summaries enabled");
                Self::new(Box::new(LlmSummary::new(LLMProcessor::new(llm.clone()))), range)
            }
            None => Self::truncating(range),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Produces a summary for `text`. This never fails.
    pub async fn summarize(&self, text: &str) -> String {
        let cleaned = normalize(text);
        if cleaned.chars().count() < MIN_SUMMARIZABLE_CHARS {
            return NO_SUMMARY.to_string();
        }

        match self.strategy.summarize(&cleaned, self.range).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => {
                warn!(strategy = self.strategy.name(), "Empty summary; falling back to truncation");
                truncate_summary(&cleaned, self.range)
            }
            Err(e) => {
                warn!(strategy = self.strategy.name(), error = %e, "Summary failed; falling back to truncation");
                truncate_summary(&cleaned, self.range)
            }
        }
    }

    /// Summarizes every text with bounded concurrency, preserving order.
    pub async fn summarize_all(&self, texts: &[&str], max_concurrent: usize) -> Vec<String> {
        stream::iter(texts)
            .map(|text| self.summarize(text))
            .buffered(max_concurrent.max(1))
            .collect()
            .await
    }
}

/// Collapses whitespace and removes control characters.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cuts `text` to at most `range.max` characters.
///
/// Text that already fits is returned unchanged. Otherwise the cut backs off
/// to the last sentence end past `range.min`, or failing that the last space
/// past `range.min`, and `...` is appended.
pub fn truncate_summary(text: &str, range: SummaryRange) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= range.max {
        return text.to_string();
    }

    let head = &chars[..range.max];

    let sentence_end = (0..head.len()).rev().find(|&i| {
        i > range.min
            && (SENTENCE_ENDS_CJK.contains(&head[i])
                || (SENTENCE_ENDS_LATIN.contains(&head[i]) && chars.get(i + 1) == Some(&' ')))
    });

    let cut = match sentence_end {
        Some(end) => &head[..=end],
        None => match (0..head.len()).rev().find(|&i| i > range.min && head[i] == ' ') {
            Some(space) => &head[..space],
            None => head,
        },
    };

    let summary: String = cut.iter().collect();
    format!("{}...", summary.trim_end().trim_end_matches(TRAILING_PUNCTUATION))
}
