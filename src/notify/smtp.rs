use super::MailSender;
use crate::config::SmtpConfig;
use crate::{NewsError, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

/// Delivers digests through an SMTP relay using STARTTLS.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        if !config.is_configured() {
            warn!("SMTP credentials are not set; email delivery will be reported as failed");
        }
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(self.config.user.clone(), self.config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| NewsError::DeliveryFailed(format!("invalid SMTP host: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();
        Ok(transport)
    }

    fn sender(&self) -> &str {
        if self.config.from.is_empty() {
            &self.config.user
        } else {
            &self.config.from
        }
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        if !self.config.is_configured() {
            return Err(NewsError::DeliveryFailed("SMTP is not configured".to_string()));
        }

        let from: Mailbox = self
            .sender()
            .parse()
            .map_err(|e| NewsError::DeliveryFailed(format!("invalid sender address: {e}")))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| NewsError::DeliveryFailed(format!("invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| NewsError::DeliveryFailed(format!("could not build message: {e}")))?;

        self.transport()?
            .send(message)
            .await
            .map_err(|e| NewsError::DeliveryFailed(format!("SMTP error: {e}")))?;

        info!(%to, "Digest email sent");
        Ok(())
    }
}
