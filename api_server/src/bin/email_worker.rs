//! Потребитель очереди писем: берёт задания из RabbitMQ и отправляет их по SMTP.

use anyhow::anyhow;
use core_logic::config::Settings;
use core_logic::email::SmtpMailer;
use core_logic::rabbitmq::{EmailQueue, EmailWorker};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let url = settings
        .rabbitmq_url
        .clone()
        .ok_or_else(|| anyhow!("RABBITMQ_URL is required for the email worker"))?;
    let smtp = SmtpMailer::from_settings(&settings)?
        .ok_or_else(|| anyhow!("SMTP_USERNAME and SMTP_PASSWORD are required for the email worker"))?;

    info!("Starting email worker...");
    let queue = EmailQueue::connect(&url, "email_worker").await?;
    let worker = EmailWorker::new(queue);

    worker
        .start_processing("email_worker", move |job| {
            let smtp = smtp.clone();
            async move { smtp.send(&job).await }
        })
        .await
}
