pub mod templates;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Outbound delivery of password-reset links.
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_password_reset(
        &self,
        to_email: &str,
        deep_link: &str,
        expires_in_minutes: u64,
    ) -> Result<(), String>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(to.parse().map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {e}"))?;

        Ok(())
    }
}

#[async_trait]
impl ResetMailer for SmtpMailer {
    async fn send_password_reset(
        &self,
        to_email: &str,
        deep_link: &str,
        expires_in_minutes: u64,
    ) -> Result<(), String> {
        let html = templates::render_password_reset(deep_link, expires_in_minutes);
        self.send(to_email, "Password Reset Request", &html).await
    }
}

/// Stand-in used when no SMTP relay is configured: nothing is sent.
pub struct DisabledMailer;

#[async_trait]
impl ResetMailer for DisabledMailer {
    async fn send_password_reset(
        &self,
        to_email: &str,
        _deep_link: &str,
        _expires_in_minutes: u64,
    ) -> Result<(), String> {
        tracing::warn!("SMTP not configured, password reset email to {to_email} was not sent");
        Ok(())
    }
}
