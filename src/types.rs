use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Zh,
    En,
    Both,
}

impl Language {
    /// Parses the accepted spellings: `zh`, `zh-TW`, `en`, `en-US`, `both`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-tw" => Some(Self::Zh),
            "en" | "en-us" => Some(Self::En),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// The concrete feed languages this selection expands to, in query order.
    pub fn search_languages(self) -> Vec<SearchLanguage> {
        match self {
            Self::Zh => vec![SearchLanguage::Zh],
            Self::En => vec![SearchLanguage::En],
            Self::Both => vec![SearchLanguage::Zh, SearchLanguage::En],
        }
    }
}

/// A single feed language, i.e. one Google News edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchLanguage {
    #[serde(rename = "zh-TW")]
    Zh,
    #[serde(rename = "en-US")]
    En,
}

impl SearchLanguage {
    pub fn code(self) -> &'static str {
        match self {
            Self::Zh => "zh-TW",
            Self::En => "en-US",
        }
    }

    /// Google News `(hl, gl, ceid)` parameters for this edition.
    pub fn edition(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Zh => ("zh-TW", "TW", "TW:zh-Hant"),
            Self::En => ("en-US", "US", "US:en"),
        }
    }
}

impl fmt::Display for SearchLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMode {
    Today,
    Custom,
}

impl DateMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Some(Self::Today),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// An article reference taken from a feed, before its page is fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateArticle {
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
    pub language: SearchLanguage,
    /// Plain-text description carried by the feed item, possibly empty.
    pub snippet: String,
}

/// Which step of the extraction chain produced an article's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMethod {
    Primary,
    Secondary,
    Partial,
    RssFallback,
    Failed,
}

impl ExtractMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Partial => "partial",
            Self::RssFallback => "rss_fallback",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExtractMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body text obtained for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub content: String,
    pub method: ExtractMethod,
    pub has_full_content: bool,
}

impl Extraction {
    pub fn full(content: String, method: ExtractMethod) -> Self {
        Self {
            content,
            method,
            has_full_content: true,
        }
    }

    pub fn rss_fallback(snippet: String) -> Self {
        Self {
            content: snippet,
            method: ExtractMethod::RssFallback,
            has_full_content: false,
        }
    }

    pub fn failed() -> Self {
        Self {
            content: String::new(),
            method: ExtractMethod::Failed,
            has_full_content: false,
        }
    }
}

/// An article after extraction and summarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
    pub language: SearchLanguage,
    pub content: String,
    pub extract_method: ExtractMethod,
    pub has_full_content: bool,
    pub summary: String,
}

impl EnrichedArticle {
    pub fn new(candidate: CandidateArticle, extraction: Extraction, summary: String) -> Self {
        Self {
            title: candidate.title,
            url: candidate.url,
            source_name: candidate.source_name,
            published_at: candidate.published_at,
            language: candidate.language,
            content: extraction.content,
            extract_method: extraction.method,
            has_full_content: extraction.has_full_content,
            summary,
        }
    }
}

/// Outcome of handing the digest to the mail capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailStatus {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Everything a run found, returned to the caller even when stages degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub articles: Vec<EnrichedArticle>,
    pub requested_count: u32,
    pub actual_count: u32,
    pub email_status: EmailStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Non-fatal problems, such as a feed branch that could not be fetched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Stages of a run. `Errored` is only reachable from `Validating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Validating,
    Fetching,
    Filtering,
    Extracting,
    Summarizing,
    Notifying,
    Complete,
    Errored,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Fetching => "fetching",
            Self::Filtering => "filtering",
            Self::Extracting => "extracting",
            Self::Summarizing => "summarizing",
            Self::Notifying => "notifying",
            Self::Complete => "complete",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_accepts_locale_spellings() {
        assert_eq!(Language::parse("en-US"), Some(Language::En));
        assert_eq!(Language::parse("zh-TW"), Some(Language::Zh));
        assert_eq!(Language::parse(" Both "), Some(Language::Both));
        assert_eq!(Language::parse("fr"), None);
    }

    #[test]
    fn both_expands_to_zh_then_en() {
        assert_eq!(
            Language::Both.search_languages(),
            vec![SearchLanguage::Zh, SearchLanguage::En]
        );
    }

    #[test]
    fn extract_method_serializes_snake_case() {
        let json = serde_json::to_string(&ExtractMethod::RssFallback).unwrap();
        assert_eq!(json, "\"rss_fallback\"");
    }

    #[test]
    fn email_status_omits_missing_error() {
        let json = serde_json::to_string(&EmailStatus::sent()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }
}
