use async_trait::async_trait;
use avocado_core::notify::{EmailMessage, Mailer};
use avocado_core::{CoreError, CoreResult};
use avocado_shared::pii::mask_email;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::app_config::EmailConfig;

/// Local catchers like MailHog listen on these and speak plain SMTP.
const PLAINTEXT_PORTS: [u16; 2] = [1025, 1027];

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the pooled async transport.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since the connection pool
    /// spawns its reaper task on construction.
    pub fn new(config: &EmailConfig, host: &str) -> CoreResult<Self> {
        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| CoreError::InternalError(format!("Invalid from address: {}", e)))?;

        let mut builder = if PLAINTEXT_PORTS.contains(&config.smtp_port) {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| CoreError::InternalError(format!("Failed to create SMTP transport: {}", e)))?
        }
        .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: EmailMessage) -> CoreResult<()> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| CoreError::ValidationError(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| CoreError::InternalError(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| CoreError::InternalError(format!("Failed to send email: {}", e)))?;

        tracing::info!("Email sent to {} with subject: {}", mask_email(&email.to), email.subject);
        Ok(())
    }
}

/// Stand-in used when no SMTP host is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: EmailMessage) -> CoreResult<()> {
        tracing::info!(
            to = %mask_email(&email.to),
            subject = %email.subject,
            "SMTP not configured; email not sent"
        );
        tracing::debug!("Email body:\n{}", email.text_body);
        Ok(())
    }
}

pub fn mailer_from_config(config: &EmailConfig) -> CoreResult<Arc<dyn Mailer>> {
    match config.smtp_host.as_deref().filter(|h| !h.is_empty()) {
        Some(host) => Ok(Arc::new(SmtpMailer::new(config, host)?)),
        None => {
            tracing::warn!("email.smtp_host is not set; outgoing email will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
