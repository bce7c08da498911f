use crate::query::Query;
use crate::types::{DateMode, EnrichedArticle, Language};
use chrono::{DateTime, FixedOffset, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

const FALLBACK_LABEL: &str = "Full text unavailable; summary built from the feed snippet";
const FAILED_LABEL: &str = "Full text unavailable";

/// A rendered digest, ready for a `MailSender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedEmail {
    pub subject: String,
    pub html_body: String,
}

/// Renders the digest subject and HTML body in the reference timezone.
pub struct EmailComposer {
    offset: FixedOffset,
}

impl EmailComposer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn compose(
        &self,
        query: &Query,
        articles: &[EnrichedArticle],
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> ComposedEmail {
        ComposedEmail {
            subject: self.subject(query, now),
            html_body: self.html_body(query, articles, note, now),
        }
    }

    pub fn subject(&self, query: &Query, now: DateTime<Utc>) -> String {
        let date = now.with_timezone(&self.offset).format("%Y/%m/%d");
        format!("News digest - {} ({date})", query.keyword)
    }

    pub fn html_body(
        &self,
        query: &Query,
        articles: &[EnrichedArticle],
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        let generated = now.with_timezone(&self.offset).format("%Y-%m-%d %H:%M:%S");
        let mut html = String::with_capacity(2048 + articles.len() * 1024);

        html.push_str("<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"></head>\n");
        html.push_str("<body style=\"font-family: sans-serif; background-color: #f0f2f5; padding: 20px;\">\n");
        html.push_str("<div style=\"max-width: 700px; margin: 0 auto; background-color: white; border-radius: 12px;\">\n");
        html.push_str("<h1 style=\"padding: 24px 30px 0; font-size: 22px;\">News digest</h1>\n");

        html.push_str("<table style=\"margin: 0 30px 20px; font-size: 14px; color: #555;\">\n");
        summary_row(&mut html, "Keyword", &query.keyword);
        summary_row(&mut html, "Language", language_label(query.language));
        summary_row(&mut html, "Date range", &date_range_label(query));
        summary_row(
            &mut html,
            "Generated",
            &format!("{generated} (UTC{})", self.offset),
        );
        summary_row(&mut html, "Articles", &articles.len().to_string());
        html.push_str("</table>\n");

        if let Some(note) = note {
            let _ = writeln!(
                html,
                "<p style=\"margin: 0 30px 20px; padding: 10px; background-color: #fff3cd; color: #856404;\">{}</p>",
                encode_text(note)
            );
        }

        for (i, article) in articles.iter().enumerate() {
            self.article_section(&mut html, i + 1, article);
        }

        html.push_str("</div>\n</body>\n</html>\n");
        html
    }

    fn article_section(&self, html: &mut String, index: usize, article: &EnrichedArticle) {
        let published = article
            .published_at
            .with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M");

        html.push_str("<div style=\"margin: 0 30px 25px; padding: 20px; background-color: #f8f9fa; border-left: 4px solid #667eea;\">\n");
        let _ = writeln!(
            html,
            "<h3 style=\"margin: 0 0 10px; font-size: 16px;\"><a href=\"{}\" target=\"_blank\">{}. {}</a></h3>",
            encode_double_quoted_attribute(&article.url),
            index,
            encode_text(&article.title)
        );
        let _ = writeln!(
            html,
            "<div style=\"color: #888; font-size: 13px; margin-bottom: 12px;\">{} | {}</div>",
            encode_text(&article.source_name),
            published
        );

        if article.has_full_content {
            let _ = writeln!(
                html,
                "<p style=\"font-size: 14px; line-height: 1.7;\">{}</p>",
                encode_text(&article.summary)
            );
        } else {
            let label = if article.content.is_empty() {
                FAILED_LABEL
            } else {
                FALLBACK_LABEL
            };
            let _ = writeln!(
                html,
                "<div class=\"no-full-content\" style=\"background-color: #fff3cd; padding: 10px;\">\
                 <span style=\"color: #856404; font-size: 12px;\">({label})</span>\
                 <p style=\"font-size: 14px; line-height: 1.7;\">{}</p></div>",
                encode_text(&article.summary)
            );
        }

        html.push_str("</div>\n");
    }
}

fn summary_row(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<tr><td><strong>{label}:</strong></td><td>{}</td></tr>",
        encode_text(value)
    );
}

fn language_label(language: Language) -> &'static str {
    match language {
        Language::Zh => "Chinese (zh-TW)",
        Language::En => "English (en-US)",
        Language::Both => "Chinese and English",
    }
}

fn date_range_label(query: &Query) -> String {
    match (query.date_mode, query.start_date, query.end_date) {
        (DateMode::Custom, Some(start), Some(end)) => format!("{start} ~ {end}"),
        _ => "Today".to_string(),
    }
}
