use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error};

use jari_core::events::SeatEvent;

/// Kafka topic carrying one message per successful seat write, keyed by
/// seat id so downstream consumers see per-seat order.
pub const SEAT_STATUS_TOPIC: &str = "seats.status.updated";

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                debug!(
                    topic,
                    key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "event published"
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic, key, "failed to publish event: {}", e);
                Err(e)
            }
        }
    }

    pub async fn publish_seat_event(&self, event: &SeatEvent) -> Result<(), PublishError> {
        let payload = event.wire_json()?;
        let key = event.seat().seat_id.to_string();
        self.publish(SEAT_STATUS_TOPIC, &key, &payload).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("kafka publish failed: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}
