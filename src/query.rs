use crate::types::{DateMode, Language, SearchLanguage};
use crate::{NewsError, Result, MAX_REQUESTED_COUNT};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const MAX_KEYWORD_CHARS: usize = 200;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw parameters as a caller submits them, e.g. the JSON body of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryParams {
    pub keyword: String,
    pub language: String,
    #[serde(default = "default_date_mode")]
    pub date_mode: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_date_mode() -> String {
    "today".to_string()
}

fn default_count() -> u32 {
    5
}

/// Inclusive publish-time bounds, stored in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts <= self.end
    }

    /// From local midnight of `first` through the last millisecond of `last`.
    fn local_days(first: NaiveDate, last: NaiveDate, offset: &FixedOffset) -> Option<Self> {
        let start = offset
            .from_local_datetime(&first.and_time(NaiveTime::MIN))
            .single()?;
        let next = last.checked_add_days(Days::new(1))?;
        let end = offset
            .from_local_datetime(&next.and_time(NaiveTime::MIN))
            .single()?
            - TimeDelta::milliseconds(1);
        Some(Self {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        })
    }
}

/// One feed request: a keyword against a single language edition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub language: SearchLanguage,
}

/// A validated query. Built once per run and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub keyword: String,
    pub language: Language,
    pub date_mode: DateMode,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub requested_count: u32,
    pub window: DateWindow,
}

impl Query {
    /// Validates raw parameters and resolves the date window.
    ///
    /// # Arguments
    ///
    /// * `params` - The caller's raw parameters.
    /// * `now` - Current instant; "today" is the local day containing it.
    /// * `offset` - The reference timezone.
    ///
    /// # Returns
    ///
    /// The validated `Query`, or `NewsError::InvalidQuery` describing the first problem found.
    pub fn build(params: &QueryParams, now: DateTime<Utc>, offset: &FixedOffset) -> Result<Self> {
        let keyword = params.keyword.trim();
        if keyword.is_empty() {
            return Err(invalid("keyword must not be empty"));
        }
        if keyword.chars().count() > MAX_KEYWORD_CHARS {
            return Err(invalid(format!(
                "keyword must be at most {MAX_KEYWORD_CHARS} characters"
            )));
        }

        if !(1..=MAX_REQUESTED_COUNT).contains(&params.count) {
            return Err(invalid(format!(
                "count must be between 1 and {MAX_REQUESTED_COUNT}, got {}",
                params.count
            )));
        }

        let language = Language::parse(&params.language).ok_or_else(|| {
            invalid(format!(
                "language must be one of zh-TW, en-US, both; got '{}'",
                params.language
            ))
        })?;

        let date_mode = DateMode::parse(&params.date_mode).ok_or_else(|| {
            invalid(format!(
                "date_mode must be 'today' or 'custom'; got '{}'",
                params.date_mode
            ))
        })?;

        let (start_date, end_date, window) = match date_mode {
            DateMode::Today => {
                let today = now.with_timezone(offset).date_naive();
                let window = DateWindow::local_days(today, today, offset)
                    .ok_or_else(|| invalid("current date is out of range"))?;
                (None, None, window)
            }
            DateMode::Custom => {
                let start = parse_date("start_date", params.start_date.as_deref())?;
                let end = parse_date("end_date", params.end_date.as_deref())?;
                if start > end {
                    return Err(invalid(format!(
                        "start_date {start} is after end_date {end}"
                    )));
                }
                let window = DateWindow::local_days(start, end, offset)
                    .ok_or_else(|| invalid("date range is out of range"))?;
                (Some(start), Some(end), window)
            }
        };

        debug!(
            %keyword,
            ?language,
            ?date_mode,
            start = %window.start,
            end = %window.end,
            "Query validated"
        );

        Ok(Self {
            keyword: keyword.to_string(),
            language,
            date_mode,
            start_date,
            end_date,
            requested_count: params.count,
            window,
        })
    }

    /// One search query per feed language, zh before en for `both`.
    pub fn search_queries(&self) -> Vec<SearchQuery> {
        self.language
            .search_languages()
            .into_iter()
            .map(|language| SearchQuery {
                keyword: self.keyword.clone(),
                language,
            })
            .collect()
    }
}

/// Checks that a recipient looks like `local@domain.tld`.
pub fn validate_recipient(recipient: &str) -> Result<()> {
    let trimmed = recipient.trim();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(invalid(format!("'{recipient}' is not a valid email address")))
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(format!("custom date mode requires {field}")))?;
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| invalid(format!("{field} '{value}' is not YYYY-MM-DD: {e}")))
}

fn invalid(message: impl Into<String>) -> NewsError {
    NewsError::InvalidQuery(message.into())
}
