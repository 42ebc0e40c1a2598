//! Отправка писем: через очередь RabbitMQ, напрямую по SMTP или никак, если ничего не настроено.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::rabbitmq::EmailQueue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmailJob {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Queued,
    Sent,
    Skipped,
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// `None`, если в настройках нет логина, пароля или адреса отправителя.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let smtp = &settings.smtp;
        let (Some(username), Some(password)) = (&smtp.username, &smtp.password) else {
            return Ok(None);
        };
        let from_email = smtp.from_email.as_deref().unwrap_or(username);
        let from = Mailbox::new(Some(smtp.from_name.clone()), from_email.parse()?);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)?
            .port(smtp.port)
            .credentials(Credentials::new(username.clone(), password.clone()))
            .build();
        Ok(Some(SmtpMailer { transport, from }))
    }

    pub fn build_message(&self, job: &EmailJob) -> anyhow::Result<Message> {
        let to = Mailbox::new(Some(job.to_name.clone()), job.to.parse()?);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(job.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(job.html_body.clone())?;
        Ok(message)
    }

    pub async fn send(&self, job: &EmailJob) -> anyhow::Result<()> {
        let message = self.build_message(job)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Куда уходят письма из API.
#[derive(Clone)]
pub enum Mailer {
    Queue(EmailQueue),
    Smtp(SmtpMailer),
    Disabled,
}

impl Mailer {
    /// Очередь, если задан RABBITMQ_URL и брокер доступен, затем SMTP, иначе отключено.
    pub async fn from_settings(settings: &Settings) -> Self {
        if let Some(url) = &settings.rabbitmq_url {
            match EmailQueue::connect(url, "api_server").await {
                Ok(queue) => return Mailer::Queue(queue),
                Err(e) => warn!("RabbitMQ unavailable ({}), falling back to direct SMTP", e),
            }
        }
        match SmtpMailer::from_settings(settings) {
            Ok(Some(smtp)) => Mailer::Smtp(smtp),
            Ok(None) => {
                warn!("SMTP is not configured, e-mails will be skipped");
                Mailer::Disabled
            }
            Err(e) => {
                warn!("Invalid SMTP settings ({}), e-mails will be skipped", e);
                Mailer::Disabled
            }
        }
    }

    pub async fn dispatch(&self, job: &EmailJob) -> CoreResult<Delivery> {
        match self {
            Mailer::Queue(queue) => {
                queue.publish(job).await.map_err(|e| CoreError::Internal(format!("failed to queue e-mail: {e}")))?;
                Ok(Delivery::Queued)
            }
            Mailer::Smtp(smtp) => {
                smtp.send(job).await.map_err(|e| CoreError::Internal(format!("failed to send e-mail: {e}")))?;
                info!("Email sent to {}", job.to);
                Ok(Delivery::Sent)
            }
            Mailer::Disabled => {
                info!("Email to {} skipped: no transport configured", job.to);
                Ok(Delivery::Skipped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        Settings::from_lookup(|key| map.get(key).map(|v| v.to_string())).unwrap()
    }

    fn job(to: &str) -> EmailJob {
        EmailJob {
            to: to.to_string(),
            to_name: "Ana Rojas".to_string(),
            subject: "Report".to_string(),
            html_body: "<p>hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn without_transport_jobs_are_skipped() {
        let mailer = Mailer::from_settings(&settings(&[])).await;
        assert!(matches!(mailer, Mailer::Disabled));
        assert_eq!(mailer.dispatch(&job("ana@mail.com")).await.unwrap(), Delivery::Skipped);
    }

    #[tokio::test]
    async fn smtp_message_uses_sender_and_html() {
        let s = settings(&[
            ("SMTP_USERNAME", "robot@school.edu"),
            ("SMTP_PASSWORD", "secret"),
            ("FROM_NAME", "Aula"),
        ]);
        let smtp = SmtpMailer::from_settings(&s).unwrap().unwrap();
        let formatted = String::from_utf8(smtp.build_message(&job("ana@mail.com")).unwrap().formatted()).unwrap();
        assert!(formatted.contains("From: Aula <robot@school.edu>"));
        assert!(formatted.contains("text/html"));
        assert!(smtp.build_message(&job("not an address")).is_err());
    }
}
