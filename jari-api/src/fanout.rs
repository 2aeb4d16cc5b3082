use std::sync::Arc;

use jari_core::events::{EventSink, SeatEvent};
use jari_store::EventProducer;

use crate::hub::SeatHub;

/// The one `EventSink` wired into the reservation manager and the hardware
/// ingest: every successful seat write lands here exactly once, is pushed
/// to all connected viewers, and goes out to Kafka for downstream
/// consumers. The Kafka publish is spawned so the writing task never waits
/// on the broker.
pub struct SeatEventFanout {
    hub: Arc<SeatHub>,
    kafka: Option<Arc<EventProducer>>,
}

impl SeatEventFanout {
    pub fn new(hub: Arc<SeatHub>, kafka: Option<Arc<EventProducer>>) -> Self {
        Self { hub, kafka }
    }
}

impl EventSink for SeatEventFanout {
    fn publish(&self, event: SeatEvent) {
        if let Some(producer) = &self.kafka {
            let producer = producer.clone();
            let outbound = event.clone();
            tokio::spawn(async move {
                if let Err(e) = producer.publish_seat_event(&outbound).await {
                    tracing::warn!("kafka publish of seat event failed: {}", e);
                }
            });
        }

        let delivered = self.hub.broadcast(&event);
        tracing::debug!(
            seat = %event.seat().seat_id,
            status = event.seat().status.as_str(),
            delivered,
            "seat event fanned out"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jari_core::seat::{Seat, SeatId, SeatType};

    #[tokio::test]
    async fn fanout_reaches_hub_subscribers_without_kafka() {
        let hub = Arc::new(SeatHub::new());
        let (_id, mut rx) = hub.register();
        let fanout = SeatEventFanout::new(hub, None);

        let event =
            SeatEvent::SeatStatusUpdated(Seat::new(SeatId::new("2741", 3, "A1"), SeatType::Priority));
        fanout.publish(event.clone());

        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
