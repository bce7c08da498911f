pub mod compose;
pub mod smtp;

pub use compose::{ComposedEmail, EmailComposer};
pub use smtp::SmtpMailer;

use crate::query::Query;
use crate::types::{EmailStatus, EnrichedArticle};
use crate::{NewsError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Transport-level email delivery.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Composes the digest and hands it to a `MailSender`.
pub struct Notifier {
    composer: EmailComposer,
    sender: Arc<dyn MailSender>,
}

impl Notifier {
    pub fn new(sender: Arc<dyn MailSender>, offset: FixedOffset) -> Self {
        Self {
            composer: EmailComposer::new(offset),
            sender,
        }
    }

    /// Sends the digest to `recipient`. Delivery problems are reported in the
    /// returned status, never as an error.
    #[instrument(skip(self, query, articles, note, now), fields(articles = articles.len()))]
    pub async fn notify(
        &self,
        recipient: &str,
        query: &Query,
        articles: &[EnrichedArticle],
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> EmailStatus {
        let email = self.composer.compose(query, articles, note, now);

        match self.sender.send(recipient, &email.subject, &email.html_body).await {
            Ok(()) => {
                info!(%recipient, "Digest delivered");
                EmailStatus::sent()
            }
            Err(NewsError::DeliveryFailed(msg)) => {
                warn!(%recipient, error = %msg, "Digest delivery failed");
                EmailStatus::failed(msg)
            }
            Err(e) => {
                warn!(%recipient, error = %e, "Digest delivery failed");
                EmailStatus::failed(e.to_string())
            }
        }
    }
}
