//! Outbound digest email over SMTP via lettre.
//!
//! `EmailTransport` is the seam the orchestrator sends through; `SmtpMailer`
//! is the production implementation. Each digest goes out as a
//! multipart/alternative message (plain text plus HTML) with a
//! generated UUID as its Message-ID, which doubles as the delivery
//! receipt id in the logs.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::error::{ConfigError, EmailError};
use crate::render::RenderedDigest;

/// Sender identity used when `DIGEST_FROM` is not set.
pub const DEFAULT_FROM: &str = "catchup <noreply@usecatchup.xyz>";

// ── Configuration ───────────────────────────────────────────────────

/// SMTP settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: secrecy::SecretString,
    pub from_address: String,
}

impl SmtpConfig {
    /// Build config from environment variables. `SMTP_HOST` is
    /// required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let smtp_host = std::env::var("SMTP_HOST")
            .map_err(|_| ConfigError::MissingEnvVar("SMTP_HOST".into()))?;

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password =
            secrecy::SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());
        let from_address =
            std::env::var("DIGEST_FROM").unwrap_or_else(|_| DEFAULT_FROM.to_string());

        Ok(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

// ── Transport trait ─────────────────────────────────────────────────

/// Receipt for a successfully handed-off digest.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Digest delivery seam.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Send one rendered digest to `to`.
    async fn send_digest(
        &self,
        to: &str,
        digest: &RenderedDigest,
    ) -> Result<SendReceipt, EmailError>;
}

/// Production mailer over a blocking SMTP transport.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    async fn send_digest(
        &self,
        to: &str,
        digest: &RenderedDigest,
    ) -> Result<SendReceipt, EmailError> {
        let config = self.config.clone();
        let to = to.to_string();
        let digest = digest.clone();

        // lettre's SmtpTransport is blocking; keep it off the runtime.
        tokio::task::spawn_blocking(move || send_blocking(&config, &to, &digest))
            .await
            .map_err(|e| EmailError::Transport(format!("send task aborted: {e}")))?
    }
}

fn send_blocking(
    config: &SmtpConfig,
    to: &str,
    digest: &RenderedDigest,
) -> Result<SendReceipt, EmailError> {
    let (email, message_id) = build_message(config, to, digest)?;

    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::relay(&config.smtp_host)
        .map_err(|e| EmailError::Transport(format!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    transport.send(&email).map_err(|e| EmailError::SendFailed {
        to: to.to_string(),
        reason: e.to_string(),
    })?;

    tracing::info!(to = %to, message_id = %message_id, "Digest email sent");
    Ok(SendReceipt { message_id })
}

/// Assemble the multipart message and its delivery id.
fn build_message(
    config: &SmtpConfig,
    to: &str,
    digest: &RenderedDigest,
) -> Result<(Message, String), EmailError> {
    let from: Mailbox = config
        .from_address
        .parse()
        .map_err(|e| EmailError::InvalidAddress {
            address: config.from_address.clone(),
            reason: format!("{e}"),
        })?;

    let to_mailbox: Mailbox = to.parse().map_err(|e| EmailError::InvalidAddress {
        address: to.to_string(),
        reason: format!("{e}"),
    })?;

    let message_id = Uuid::new_v4().to_string();

    let email = Message::builder()
        .from(from)
        .to(to_mailbox)
        .subject(digest.subject.clone())
        .message_id(Some(format!("<{message_id}@usecatchup.xyz>")))
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(digest.text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(digest.html.clone()),
                ),
        )
        .map_err(|e| EmailError::BuildFailed(e.to_string()))?;

    Ok((email, message_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            smtp_host: "smtp.test.com".into(),
            smtp_port: 587,
            username: "user".into(),
            password: secrecy::SecretString::from("pass"),
            from_address: DEFAULT_FROM.into(),
        }
    }

    fn digest() -> RenderedDigest {
        RenderedDigest {
            subject: "catchup on your topics (03/14 - 03/15)".into(),
            html: "<html><body>digest</body></html>".into(),
            text: "digest text".into(),
        }
    }

    #[test]
    fn builds_multipart_message_with_uuid_receipt() {
        let (email, message_id) = build_message(&config(), "reader@example.com", &digest()).unwrap();

        assert!(Uuid::parse_str(&message_id).is_ok());

        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.contains("catchup on your topics (03/14 - 03/15)"));
        assert!(formatted.contains("digest text"));
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains(&message_id));
    }

    #[test]
    fn rejects_invalid_recipient() {
        let err = build_message(&config(), "not-an-address", &digest()).unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress { address, .. } if address == "not-an-address"));
    }

    #[test]
    fn rejects_invalid_sender() {
        let mut cfg = config();
        cfg.from_address = "broken sender".into();
        let err = build_message(&cfg, "reader@example.com", &digest()).unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress { .. }));
    }

    #[test]
    fn config_from_env_requires_host() {
        // SAFETY: This test runs in isolation; no other thread reads SMTP_HOST concurrently.
        unsafe { std::env::remove_var("SMTP_HOST") };
        assert!(matches!(
            SmtpConfig::from_env(),
            Err(ConfigError::MissingEnvVar(var)) if var == "SMTP_HOST"
        ));
    }
}
