use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::info;

use crate::config::SmtpConfig;

/// Sends the completion email: alternative plain/HTML body plus the text
/// report as an attachment, over STARTTLS.
pub struct Notifier {
    config: SmtpConfig,
}

impl Notifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub async fn send_report(
        &self,
        subject: &str,
        body: &str,
        html_body: &str,
        attachment_path: &Path,
    ) -> Result<()> {
        let from: Mailbox = self
            .config
            .sender
            .parse()
            .context("smtp.sender is not a valid mailbox")?;
        let to: Mailbox = self
            .config
            .recipient
            .parse()
            .context("smtp.recipient is not a valid mailbox")?;

        let attachment_name = attachment_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup_report.txt".to_string());
        let attachment_bytes = tokio::fs::read(attachment_path)
            .await
            .with_context(|| format!("failed to read {}", attachment_path.display()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .multipart(MultiPart::alternative_plain_html(
                        body.to_string(),
                        html_body.to_string(),
                    ))
                    .singlepart(
                        Attachment::new(attachment_name)
                            .body(attachment_bytes, ContentType::TEXT_PLAIN),
                    ),
            )
            .context("failed to build report email")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
            .context("invalid SMTP relay")?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        mailer
            .send(message)
            .await
            .context("SMTP send failed")?;
        info!(recipient = %self.config.recipient, "report email sent");
        Ok(())
    }
}
