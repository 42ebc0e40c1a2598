use futures_util::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use anyhow::Error;

use crate::email::EmailJob;

pub const EMAIL_QUEUE_NAME: &str = "email_outbox";
pub const EMAIL_EXCHANGE_NAME: &str = "email_outbox_exchange";
pub const EMAIL_ROUTING_KEY: &str = "email";

/// Очередь писем в RabbitMQ: API публикует, `email_worker` потребляет.
#[derive(Clone)]
pub struct EmailQueue {
    _connection: Arc<Connection>,
    channel: Arc<Channel>,
}

impl EmailQueue {
    pub async fn connect(url: &str, connection_name: &str) -> Result<Self, Error> {
        let conn = Connection::connect(
            url,
            ConnectionProperties::default().with_connection_name(connection_name.into()),
        )
        .await?;
        let channel = conn.create_channel().await?;

        channel
            .exchange_declare(
                EMAIL_EXCHANGE_NAME,
                ExchangeKind::Direct,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                EMAIL_QUEUE_NAME,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                EMAIL_QUEUE_NAME,
                EMAIL_EXCHANGE_NAME,
                EMAIL_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!("Connected to RabbitMQ, queue {} ready", EMAIL_QUEUE_NAME);
        Ok(EmailQueue { _connection: Arc::new(conn), channel: Arc::new(channel) })
    }

    pub async fn publish(&self, job: &EmailJob) -> Result<(), Error> {
        let payload = serde_json::to_vec(job)?;
        self.channel
            .basic_publish(
                EMAIL_EXCHANGE_NAME,
                EMAIL_ROUTING_KEY,
                BasicPublishOptions::default(),
                &payload,
                // delivery_mode 2: сообщение переживает перезапуск брокера
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?;
        info!("Email job queued for {}", job.to);
        Ok(())
    }

    async fn consumer(&self, consumer_tag: &str) -> Result<Consumer, Error> {
        // По одному письму за раз
        self.channel.basic_qos(1, BasicQosOptions::default()).await?;
        let consumer = self
            .channel
            .basic_consume(EMAIL_QUEUE_NAME, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await?;
        info!("Email consumer created with tag: {}", consumer_tag);
        Ok(consumer)
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel.basic_ack(delivery_tag, BasicAckOptions::default()).await?;
        Ok(())
    }
}

/// Цикл обработки писем. Каждое сообщение подтверждается, даже если отправка не удалась.
pub struct EmailWorker {
    queue: EmailQueue,
}

impl EmailWorker {
    pub fn new(queue: EmailQueue) -> Self {
        EmailWorker { queue }
    }

    pub async fn start_processing<F, Fut>(&self, consumer_tag: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(EmailJob) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let mut consumer = self.queue.consumer(consumer_tag).await?;
        info!("Email worker started, waiting for jobs...");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    error!("Failed to receive email job: {}", e);
                    continue;
                }
            };
            let delivery_tag = delivery.delivery_tag;

            match serde_json::from_slice::<EmailJob>(&delivery.data) {
                Ok(job) => {
                    let to = job.to.clone();
                    match handler(job).await {
                        Ok(()) => info!("Email sent to {}", to),
                        Err(e) => error!("Failed to send email to {}: {}", to, e),
                    }
                }
                Err(e) => error!("Failed to parse email job: {}", e),
            }

            if let Err(e) = self.queue.ack(delivery_tag).await {
                error!("Failed to ack email job: {}", e);
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!("Email processing loop ended");
        Ok(())
    }
}
