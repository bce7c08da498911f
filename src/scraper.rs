use crate::{NewsError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

/// Phrases from page chrome that leak into paragraph text.
const NOISE_PATTERNS: [&str; 8] = [
    "訂閱電子報",
    "加入會員",
    "免費註冊",
    "分享到",
    "Advertisement",
    "Sponsored",
    r"Loading\.\.\.",
    "Please wait",
];

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i){}", NOISE_PATTERNS.join("|"))).expect("valid noise pattern")
});

/// The `ContentScraper` struct is responsible for extracting the article body from HTML documents.
/// It uses CSS selectors to identify the relevant parts of the document.
pub struct ContentScraper {
    /// CSS selectors tried in order; the first one yielding text wins.
    selectors: Vec<Selector>,
    /// Selector for JSON-LD metadata blocks.
    json_ld: Option<Selector>,
}

impl Default for ContentScraper {
    /// Provides default values for the `ContentScraper` struct.
    ///
    /// # Returns
    ///
    /// A `ContentScraper` instance with selectors for common news layouts.
    fn default() -> Self {
        let default_selectors = [
            "[itemprop='articleBody'] p",
            "article p",
            "div.article-body p, div.article-content p, div.story-body p",
            "div.content p, div.post-content p, div.entry-content p",
            "main p",
            "p",
        ];

        Self::new(default_selectors)
    }
}

impl ContentScraper {
    /// Creates a new `ContentScraper` with the given content selectors.
    ///
    /// # Arguments
    ///
    /// * `content_selectors` - An iterator of CSS selectors for extracting the article body.
    ///
    /// # Returns
    ///
    /// A new instance of `ContentScraper`. Selectors that fail to parse are skipped.
    pub fn new(content_selectors: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let selectors = content_selectors
            .into_iter()
            .filter_map(|s| Selector::parse(s.as_ref()).ok())
            .collect();

        Self {
            selectors,
            json_ld: Selector::parse("script[type='application/ld+json']").ok(),
        }
    }

    /// Extracts the article body from the given HTML string.
    ///
    /// # Arguments
    ///
    /// * `html` - The HTML string to be parsed.
    ///
    /// # Returns
    ///
    /// A `Result` containing the cleaned article text, or an error if nothing was found.
    #[instrument(skip(self, html), fields(html_length = html.len()))]
    pub fn extract(&self, html: &str) -> Result<String> {
        let document = Html::parse_document(html);

        if let Some(body) = self.extract_json_ld_body(&document) {
            let cleaned = clean_text(&body);
            if !cleaned.is_empty() {
                debug!(chars = cleaned.chars().count(), "Used JSON-LD articleBody");
                return Ok(cleaned);
            }
        }

        self.extract_content(&document)
    }

    /// Extracts the main content from the HTML document using the configured selectors.
    fn extract_content(&self, document: &Html) -> Result<String> {
        for selector in &self.selectors {
            let content = self.extract_text_by_selector(document, selector);
            if !content.is_empty() {
                let cleaned = clean_text(&content);
                if !cleaned.is_empty() {
                    return Ok(cleaned);
                }
            }
        }

        Err(NewsError::ExtractionError(
            "No content found with available selectors".to_string(),
        ))
    }

    /// Reads `articleBody` from JSON-LD blocks, including `@graph` wrappers
    /// and top-level arrays.
    fn extract_json_ld_body(&self, document: &Html) -> Option<String> {
        let selector = self.json_ld.as_ref()?;
        document.select(selector).find_map(|script| {
            let raw = script.text().collect::<String>();
            let json: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
            find_article_body(&json)
        })
    }

    /// Extracts text content from the HTML document using the given selector.
    fn extract_text_by_selector(&self, document: &Html, selector: &Selector) -> String {
        document
            .select(selector)
            .map(|element| element.text().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

fn find_article_body(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Array(items) => items.iter().find_map(find_article_body),
        serde_json::Value::Object(obj) => {
            if let Some(body) = obj.get("articleBody").and_then(|b| b.as_str()) {
                if !body.trim().is_empty() {
                    return Some(body.to_string());
                }
            }
            obj.get("@graph").and_then(find_article_body)
        }
        _ => None,
    }
}

/// Cleans extracted text by removing page noise and normalizing whitespace.
///
/// Non-ASCII text is kept as is, since articles are frequently Chinese.
pub fn clean_text(text: &str) -> String {
    let without_noise = NOISE.replace_all(text, " ");
    without_noise.split_whitespace().collect::<Vec<_>>().join(" ")
}
