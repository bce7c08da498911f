use async_trait::async_trait;
use chrono::{DateTime, Utc};
use news_digest::extract::{ContentExtractor, HttpPageFetcher, PageFetcher};
use news_digest::feed::{FeedEntry, FeedSource, GoogleNewsFeed};
use news_digest::notify::MailSender;
use news_digest::pipeline::FixedClock;
use news_digest::query::{QueryParams, SearchQuery};
use news_digest::summarize::{Summarizer, NO_SUMMARY};
use news_digest::types::SearchLanguage;
use news_digest::{
    ExtractMethod, NewsError, Pipeline, PipelineConfig, Result, RunRequest, RunResult,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// 12:00 on 2024-05-02 in Taipei.
const NOW: &str = "2024-05-02T04:00:00Z";
const TODAY_EARLY: &str = "Thu, 02 May 2024 01:00:00 GMT";
const TODAY_LATE: &str = "Thu, 02 May 2024 03:00:00 GMT";
const YESTERDAY: &str = "Wed, 01 May 2024 08:00:00 GMT";

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(NOW).unwrap().with_timezone(&Utc)
}

fn entry(title: &str, link: &str, pub_date: &str, description: Option<&str>) -> FeedEntry {
    FeedEntry {
        title: title.to_string(),
        link: link.to_string(),
        pub_date: Some(pub_date.to_string()),
        description: description.map(str::to_string),
        source_name: None,
    }
}

fn article_html(sentence: &str) -> String {
    format!(
        "<html><body><nav>Home</nav><article><p>{}</p></article></body></html>",
        sentence.repeat(6)
    )
}

#[derive(Default)]
struct FakeFeed {
    entries: Vec<(SearchLanguage, FeedEntry)>,
    unavailable: HashSet<SearchLanguage>,
    calls: AtomicUsize,
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn fetch_feed(&self, query: &SearchQuery) -> Result<Vec<FeedEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.contains(&query.language) {
            return Err(NewsError::SourceUnavailable(format!(
                "{} feed is down",
                query.language
            )));
        }
        Ok(self
            .entries
            .iter()
            .filter(|(language, _)| *language == query.language)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

#[derive(Default)]
struct FakePages {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

impl FakePages {
    fn with(pages: &[(&str, String)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageFetcher for FakePages {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| NewsError::ExtractionError(format!("HTTP 404 Not Found for {url}")))
    }
}

#[derive(Default)]
struct FakeMail {
    fail_with: Option<String>,
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl MailSender for FakeMail {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        if let Some(msg) = &self.fail_with {
            return Err(NewsError::DeliveryFailed(msg.clone()));
        }
        self.sent.lock().unwrap().push((
            to.to_string(),
            subject.to_string(),
            html_body.to_string(),
        ));
        Ok(())
    }
}

fn pipeline(feed: Arc<FakeFeed>, pages: Arc<FakePages>, mail: Arc<FakeMail>) -> Pipeline {
    let config = PipelineConfig::default();
    let extractor = ContentExtractor::from_config(&config, pages, None);
    let summarizer = Summarizer::from_config(&config);
    Pipeline::new(config, feed, extractor, summarizer, mail).with_clock(Arc::new(FixedClock(now())))
}

fn request(keyword: &str, language: &str, count: u32) -> RunRequest {
    RunRequest {
        params: QueryParams {
            keyword: keyword.to_string(),
            language: language.to_string(),
            date_mode: "today".to_string(),
            start_date: None,
            end_date: None,
            count,
        },
        recipient: "reader@example.com".to_string(),
    }
}

fn assert_run_invariants(result: &RunResult) {
    let urls: HashSet<_> = result.articles.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls.len(), result.articles.len(), "duplicate URLs in result");
    assert_eq!(result.actual_count as usize, result.articles.len());
    assert!(result.actual_count <= result.requested_count);
    assert_eq!(
        result.note.is_some(),
        result.actual_count < result.requested_count
    );
    for article in &result.articles {
        if !article.has_full_content {
            assert!(matches!(
                article.extract_method,
                ExtractMethod::RssFallback | ExtractMethod::Failed
            ));
        }
    }
}

#[tokio::test]
async fn test_partial_day_with_unreachable_article() {
    let body = "The central bank held interest rates steady on Thursday. ";
    let feed = Arc::new(FakeFeed {
        entries: vec![
            (SearchLanguage::En, entry("Rates hold - Daily Post", "https://news.example.com/a", TODAY_EARLY, None)),
            (SearchLanguage::En, entry("Markets wait - Wire", "https://news.example.com/b", TODAY_LATE, None)),
            (SearchLanguage::En, entry("Old one - Wire", "https://news.example.com/c", YESTERDAY, Some("old"))),
            (SearchLanguage::En, entry("Old two - Wire", "https://news.example.com/d", YESTERDAY, Some("old"))),
            (SearchLanguage::En, entry("Old three - Wire", "https://news.example.com/e", YESTERDAY, Some("old"))),
        ],
        ..FakeFeed::default()
    });
    let pages = Arc::new(FakePages::with(&[(
        "https://news.example.com/a",
        article_html(body),
    )]));
    let mail = Arc::new(FakeMail::default());

    let result = pipeline(feed, pages, mail.clone())
        .run(request("interest rates", "en-US", 5))
        .await
        .unwrap();

    assert_run_invariants(&result);
    assert_eq!(result.requested_count, 5);
    assert_eq!(result.actual_count, 2);
    assert_eq!(
        result.note.as_deref(),
        Some("Only 2 matching articles found, fewer than the requested 5")
    );

    let first = &result.articles[0];
    assert_eq!(first.title, "Rates hold");
    assert_eq!(first.source_name, "Daily Post");
    assert_eq!(first.extract_method, ExtractMethod::Primary);
    assert!(first.has_full_content);
    assert!(first.content.starts_with("The central bank"));

    let second = &result.articles[1];
    assert_eq!(second.extract_method, ExtractMethod::Failed);
    assert!(!second.has_full_content);
    assert!(second.content.is_empty());
    assert_eq!(second.summary, NO_SUMMARY);

    assert!(result.email_status.success);
    let sent = mail.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "reader@example.com");
    assert_eq!(sent[0].1, "News digest - interest rates (2024/05/02)");
}

#[tokio::test]
async fn test_mail_failure_keeps_articles() {
    let feed = Arc::new(FakeFeed {
        entries: (1..=3)
            .map(|i| {
                (
                    SearchLanguage::En,
                    entry(
                        &format!("Story {i} - Wire"),
                        &format!("https://news.example.com/{i}"),
                        TODAY_EARLY,
                        None,
                    ),
                )
            })
            .collect(),
        ..FakeFeed::default()
    });
    let pages = Arc::new(FakePages {
        pages: (1..=3)
            .map(|i| {
                (
                    format!("https://news.example.com/{i}"),
                    article_html(&format!("Story number {i} has a long and detailed body. ")),
                )
            })
            .collect(),
        ..FakePages::default()
    });
    let mail = Arc::new(FakeMail {
        fail_with: Some("auth failed".to_string()),
        ..FakeMail::default()
    });

    let result = pipeline(feed, pages, mail)
        .run(request("story", "en", 3))
        .await
        .unwrap();

    assert_run_invariants(&result);
    assert_eq!(result.articles.len(), 3);
    assert!(result.note.is_none());
    assert!(!result.email_status.success);
    assert_eq!(result.email_status.error.as_deref(), Some("auth failed"));
    let titles: Vec<_> = result.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Story 1", "Story 2", "Story 3"]);
}

#[tokio::test]
async fn test_invalid_query_fails_before_network() {
    let feed = Arc::new(FakeFeed::default());
    let pages = Arc::new(FakePages::default());
    let mail = Arc::new(FakeMail::default());
    let pipeline = pipeline(feed.clone(), pages.clone(), mail.clone());

    let err = pipeline.run(request("   ", "en", 5)).await.unwrap_err();
    assert!(matches!(err, NewsError::InvalidQuery(_)));

    let err = pipeline.run(request("AI", "fr", 5)).await.unwrap_err();
    assert!(matches!(err, NewsError::InvalidQuery(_)));

    let err = pipeline.run(request("AI", "en", 21)).await.unwrap_err();
    assert!(matches!(err, NewsError::InvalidQuery(_)));

    let mut bad_recipient = request("AI", "en", 5);
    bad_recipient.recipient = "nobody".to_string();
    let err = pipeline.run(bad_recipient).await.unwrap_err();
    assert!(matches!(err, NewsError::InvalidQuery(_)));

    assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
    assert_eq!(pages.calls.load(Ordering::SeqCst), 0);
    assert!(mail.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_results_still_notify() {
    let mail = Arc::new(FakeMail::default());
    let result = pipeline(
        Arc::new(FakeFeed::default()),
        Arc::new(FakePages::default()),
        mail.clone(),
    )
    .run(request("nothing today", "both", 5))
    .await
    .unwrap();

    assert_run_invariants(&result);
    assert_eq!(result.actual_count, 0);
    assert!(result
        .note
        .as_deref()
        .unwrap()
        .starts_with("No matching articles found"));
    assert!(result.email_status.success);
    assert_eq!(mail.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unavailable_branch_becomes_warning() {
    let body = "Semiconductor exports rose again this quarter. ";
    let feed = Arc::new(FakeFeed {
        entries: vec![(
            SearchLanguage::En,
            entry("Exports rise - Wire", "https://news.example.com/x", TODAY_EARLY, None),
        )],
        unavailable: HashSet::from([SearchLanguage::Zh]),
        ..FakeFeed::default()
    });
    let pages = Arc::new(FakePages::with(&[("https://news.example.com/x", article_html(body))]));

    let result = pipeline(feed.clone(), pages, Arc::new(FakeMail::default()))
        .run(request("exports", "both", 1))
        .await
        .unwrap();

    assert_run_invariants(&result);
    assert_eq!(feed.calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.actual_count, 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("zh-TW feed is down"));
}

#[tokio::test]
async fn test_duplicates_across_languages_and_snippet_fallback() {
    let feed = Arc::new(FakeFeed {
        entries: vec![
            (
                SearchLanguage::Zh,
                entry(
                    "台積電法說會 - 中央社",
                    "https://news.example.com/tsmc?utm_source=google",
                    TODAY_EARLY,
                    Some("<b>台積電</b>今日舉行法說會，公布第一季財報與全年展望。"),
                ),
            ),
            (
                SearchLanguage::En,
                entry(
                    "TSMC earnings call - Wire",
                    "https://news.example.com/tsmc",
                    TODAY_LATE,
                    Some("English duplicate"),
                ),
            ),
        ],
        ..FakeFeed::default()
    });

    let result = pipeline(feed, Arc::new(FakePages::default()), Arc::new(FakeMail::default()))
        .run(request("台積電", "both", 5))
        .await
        .unwrap();

    assert_run_invariants(&result);
    assert_eq!(result.actual_count, 1);
    let article = &result.articles[0];
    assert_eq!(article.title, "台積電法說會");
    assert_eq!(article.source_name, "中央社");
    assert_eq!(article.language, SearchLanguage::Zh);
    assert_eq!(article.extract_method, ExtractMethod::RssFallback);
    assert!(!article.has_full_content);
    assert_eq!(article.content, "台積電 今日舉行法說會，公布第一季財報與全年展望。");
}

#[tokio::test]
async fn test_identical_runs_serialize_identically() {
    let body = "Typhoon warnings were issued for the eastern coast. ";
    let feed = Arc::new(FakeFeed {
        entries: vec![
            (SearchLanguage::En, entry("Typhoon nears - Wire", "https://news.example.com/t1", TODAY_EARLY, None)),
            (SearchLanguage::En, entry("Flights cancelled - Wire", "https://news.example.com/t2", TODAY_LATE, Some("Airlines cancelled dozens of flights."))),
        ],
        ..FakeFeed::default()
    });
    let pages = Arc::new(FakePages::with(&[("https://news.example.com/t1", article_html(body))]));
    let pipeline = pipeline(feed, pages, Arc::new(FakeMail::default()));

    let first = pipeline.run(request("typhoon", "en", 4)).await.unwrap();
    let second = pipeline.run(request("typhoon", "en", 4)).await.unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_google_news_feed_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let rss = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>"AI" - Google News</title>
<item><title>AI chips in demand - Tech Daily</title><link>{base}/article/1</link>
<pubDate>{TODAY_EARLY}</pubDate><description>Chip makers report&nbsp;record orders.</description>
<source url="https://techdaily.example.com">Tech Daily</source></item>
<item><title>Yesterday's AI news - Tech Daily</title><link>{base}/article/2</link>
<pubDate>{YESTERDAY}</pubDate></item>
</channel></rss>"#
    );

    let feed_mock = server
        .mock("GET", "/rss/search")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("q".into(), "AI".into()),
            mockito::Matcher::UrlEncoded("hl".into(), "en-US".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/rss+xml; charset=utf-8")
        .with_body(rss)
        .create_async()
        .await;

    let page_mock = server
        .mock("GET", "/article/1")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(article_html("Demand for AI accelerators keeps growing across data centers. "))
        .create_async()
        .await;

    let config = PipelineConfig {
        max_fetch_attempts: 1,
        ..PipelineConfig::default()
    };
    let feed = Arc::new(GoogleNewsFeed::with_base_url(&config, format!("{base}/rss/search")).unwrap());
    let fetcher = Arc::new(HttpPageFetcher::new(&config).unwrap());
    let extractor = ContentExtractor::from_config(&config, fetcher, None);
    let summarizer = Summarizer::from_config(&config);
    let mail = Arc::new(FakeMail::default());
    let pipeline = Pipeline::new(config, feed, extractor, summarizer, mail.clone())
        .with_clock(Arc::new(FixedClock(now())));

    let result = pipeline.run(request("AI", "en", 2)).await.unwrap();

    feed_mock.assert_async().await;
    page_mock.assert_async().await;
    assert_run_invariants(&result);
    assert_eq!(result.actual_count, 1);
    let article = &result.articles[0];
    assert_eq!(article.title, "AI chips in demand");
    assert_eq!(article.source_name, "Tech Daily");
    assert_eq!(article.extract_method, ExtractMethod::Primary);
    assert!(mail.sent.lock().unwrap()[0].2.contains("AI chips in demand"));
}
