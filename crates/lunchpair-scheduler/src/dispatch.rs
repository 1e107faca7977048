//! Mail dispatch: actually sends notices.
//! Supports: SMTP (async lettre, STARTTLS) and a log-only mailer for
//! deployments without mail configured.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use lunchpair_core::config::MailConfig;
use lunchpair_core::{LeftoverNotice, LunchError, Mailer, PairNotice, Result};
use std::sync::Arc;

/// Subject and body for a match notice.
pub fn pair_message(notice: &PairNotice) -> (String, String) {
    (
        "New lunch match!".to_string(),
        format!(
            "Hi {}, you have been matched with {} {}. Have fun! :)",
            notice.first_name, notice.partner_first_name, notice.partner_last_name
        ),
    )
}

/// Subject and body for the odd-one-out notice.
pub fn leftover_message(notice: &LeftoverNotice) -> (String, String) {
    (
        "We're sorry!".to_string(),
        format!(
            "Sorry {}, you're the odd one out this time. :(",
            notice.first_name
        ),
    )
}

/// Plain-text SMTP mailer.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.username)
            .parse()
            .map_err(|e| LunchError::Mail(format!("Invalid from: {e}")))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| LunchError::Mail(format!("SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { from, transport })
    }

    async fn send_text(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| LunchError::Mail(format!("Invalid to '{to}': {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| LunchError::Mail(format!("Build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| LunchError::Mail(format!("SMTP send: {e}")))?;

        tracing::debug!("📤 Email sent to: {to}");
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_pair_notice(&self, notice: &PairNotice) -> Result<()> {
        let (subject, body) = pair_message(notice);
        self.send_text(&notice.to_email, &subject, body).await
    }

    async fn send_leftover_notice(&self, notice: &LeftoverNotice) -> Result<()> {
        let (subject, body) = leftover_message(notice);
        self.send_text(&notice.to_email, &subject, body).await
    }
}

/// Writes notices to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_pair_notice(&self, notice: &PairNotice) -> Result<()> {
        let (subject, body) = pair_message(notice);
        tracing::info!("✉️ [mail disabled] to={} subject={subject:?} body={body:?}", notice.to_email);
        Ok(())
    }

    async fn send_leftover_notice(&self, notice: &LeftoverNotice) -> Result<()> {
        let (subject, body) = leftover_message(notice);
        tracing::info!("✉️ [mail disabled] to={} subject={subject:?} body={body:?}", notice.to_email);
        Ok(())
    }
}

/// Build the mailer the config asks for.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    if !config.enabled {
        tracing::info!("Mail disabled, notices will be logged only");
        return Ok(Arc::new(LogMailer));
    }
    if config.username.is_empty() {
        return Err(LunchError::Config("mail.username is required when mail is enabled".into()));
    }
    Ok(Arc::new(SmtpMailer::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_message() {
        let (subject, body) = pair_message(&PairNotice {
            to_email: "ada@example.com".into(),
            first_name: "Ada".into(),
            partner_first_name: "Grace".into(),
            partner_last_name: "Hopper".into(),
        });
        assert_eq!(subject, "New lunch match!");
        assert_eq!(body, "Hi Ada, you have been matched with Grace Hopper. Have fun! :)");
    }

    #[test]
    fn test_leftover_message() {
        let (subject, body) = leftover_message(&LeftoverNotice {
            to_email: "cy@example.com".into(),
            first_name: "Cy".into(),
        });
        assert_eq!(subject, "We're sorry!");
        assert!(body.starts_with("Sorry Cy,"));
    }

    #[test]
    fn test_disabled_mail_uses_log_mailer() {
        assert!(mailer_from_config(&MailConfig::default()).is_ok());
    }

    #[test]
    fn test_enabled_mail_requires_username() {
        let config = MailConfig {
            enabled: true,
            ..MailConfig::default()
        };
        assert!(matches!(mailer_from_config(&config), Err(LunchError::Config(_))));
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let notice = LeftoverNotice {
            to_email: "cy@example.com".into(),
            first_name: "Cy".into(),
        };
        assert!(LogMailer.send_leftover_notice(&notice).await.is_ok());
    }
}
