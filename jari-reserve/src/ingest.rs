use chrono::Utc;
use std::sync::Arc;

use jari_core::events::{EventSink, SeatEvent};
use jari_core::layout::LineLayout;
use jari_core::repository::{
    Expected, ReservationRepository, SeatStore, SeatStoreError,
};
use jari_core::seat::{Seat, SeatId, SeatStatus};

/// Applies seat-status pushes from the sensor fleet. The sensor is
/// authoritative for occupancy, with one carve-out: it may not silently
/// clobber an active reservation. A push onto a `reserved` seat is rejected
/// unless the new status is `maintenance`, which always wins and cancels
/// the stranded reservation first.
pub struct StatusIngest {
    seats: Arc<dyn SeatStore>,
    reservations: Arc<dyn ReservationRepository>,
    events: Arc<dyn EventSink>,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("seat not found: {0}")]
    SeatNotFound(SeatId),

    #[error("seat has an active reservation: {0}")]
    ReservedSeat(SeatId),

    #[error("seat changed concurrently, resend: {0}")]
    Raced(SeatId),

    #[error("status {} cannot be set by hardware", .0.as_str())]
    InvalidStatus(SeatStatus),

    #[error("storage failure: {0}")]
    Store(String),
}

impl StatusIngest {
    pub fn new(
        seats: Arc<dyn SeatStore>,
        reservations: Arc<dyn ReservationRepository>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            seats,
            reservations,
            events,
        }
    }

    pub async fn apply_hardware_status(
        &self,
        seat_id: &SeatId,
        new_status: SeatStatus,
    ) -> Result<Seat, IngestError> {
        // Reserved is reservation-driven; a sensor claiming it would leave
        // a reserved seat with no owning reservation.
        if new_status == SeatStatus::Reserved {
            return Err(IngestError::InvalidStatus(new_status));
        }

        let seat = self
            .seats
            .get(seat_id)
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?
            .ok_or_else(|| IngestError::SeatNotFound(seat_id.clone()))?;

        let expected = if seat.status == SeatStatus::Reserved {
            if new_status != SeatStatus::Maintenance {
                return Err(IngestError::ReservedSeat(seat_id.clone()));
            }
            // Taking a reserved seat out of service strands its
            // reservation; cancel it before the seat write goes out.
            if let Some(reservation_id) = seat.reservation_id {
                if let Err(e) = self
                    .reservations
                    .cancel(reservation_id, Utc::now())
                    .await
                {
                    tracing::error!(
                        reservation = %reservation_id,
                        seat = %seat_id,
                        "failed to cancel reservation on maintenance push: {}",
                        e
                    );
                }
                tracing::warn!(
                    seat = %seat_id,
                    reservation = %reservation_id,
                    "reserved seat taken out of service"
                );
            }
            Expected::Any
        } else {
            // Guard against a reservation landing between our read and
            // this write; the sensor re-sends on its next tick.
            Expected::Status(seat.status)
        };

        match self
            .seats
            .compare_and_set(seat_id, expected, new_status, None)
            .await
        {
            Ok(updated) => {
                self.events
                    .publish(SeatEvent::SeatStatusUpdated(updated.clone()));
                Ok(updated)
            }
            Err(SeatStoreError::Conflict(_)) => Err(IngestError::Raced(seat_id.clone())),
            Err(SeatStoreError::NotFound(_)) => Err(IngestError::SeatNotFound(seat_id.clone())),
            Err(e) => Err(IngestError::Store(e.to_string())),
        }
    }

    /// Provision every seat of a train from its line layout. Seats start
    /// `available`; no events are published — viewers prime from the
    /// full-state fetch.
    pub async fn provision_train(
        &self,
        train_no: &str,
        layout: &LineLayout,
    ) -> Result<usize, IngestError> {
        let seats = layout.seats_for_train(train_no);
        let count = seats.len();
        for seat in seats {
            self.seats
                .insert(seat)
                .await
                .map_err(|e| IngestError::Store(e.to_string()))?;
        }
        tracing::info!(train = train_no, line = %layout.line, count, "train provisioned");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jari_core::reservation::Reservation;
    use jari_core::seat::SeatType;
    use jari_store::{MemoryReservations, MemorySeatStore};
    use std::sync::Mutex;

    struct RecordingSink(Mutex<Vec<SeatEvent>>);

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }

        fn events(&self) -> Vec<SeatEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn publish(&self, event: SeatEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn seat_id() -> SeatId {
        SeatId::new("2741", 3, "A1")
    }

    async fn ingest_with_seat() -> (
        StatusIngest,
        Arc<MemorySeatStore>,
        Arc<MemoryReservations>,
        Arc<RecordingSink>,
    ) {
        let seats = Arc::new(MemorySeatStore::new());
        let reservations = Arc::new(MemoryReservations::new());
        let sink = RecordingSink::new();
        seats
            .insert(Seat::new(seat_id(), SeatType::Priority))
            .await
            .unwrap();
        let ingest = StatusIngest::new(seats.clone(), reservations.clone(), sink.clone());
        (ingest, seats, reservations, sink)
    }

    #[tokio::test]
    async fn occupied_push_updates_seat_and_publishes_one_event() {
        let (ingest, _, _, sink) = ingest_with_seat().await;

        let updated = ingest
            .apply_hardware_status(&seat_id(), SeatStatus::Occupied)
            .await
            .unwrap();
        assert_eq!(updated.status, SeatStatus::Occupied);
        assert_eq!(updated.reservation_id, None);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seat().status, SeatStatus::Occupied);
    }

    #[tokio::test]
    async fn push_on_unknown_seat_is_not_found() {
        let (ingest, _, _, _) = ingest_with_seat().await;
        let missing = SeatId::new("0000", 1, "A1");
        assert!(matches!(
            ingest
                .apply_hardware_status(&missing, SeatStatus::Occupied)
                .await,
            Err(IngestError::SeatNotFound(_))
        ));
    }

    #[tokio::test]
    async fn occupied_push_on_reserved_seat_is_rejected() {
        let (ingest, seats, reservations, sink) = ingest_with_seat().await;
        let reservation = Reservation::new("u1", seat_id());
        reservations.create(&reservation).await.unwrap();
        seats
            .compare_and_set(
                &seat_id(),
                Expected::Any,
                SeatStatus::Reserved,
                Some(reservation.id),
            )
            .await
            .unwrap();

        assert!(matches!(
            ingest
                .apply_hardware_status(&seat_id(), SeatStatus::Occupied)
                .await,
            Err(IngestError::ReservedSeat(_))
        ));

        // Seat and reservation untouched, nothing broadcast.
        let seat = seats.get(&seat_id()).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Reserved);
        assert!(reservations.get(reservation.id).await.unwrap().unwrap().is_active());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn maintenance_push_overrides_reservation_and_cancels_it() {
        let (ingest, seats, reservations, sink) = ingest_with_seat().await;
        let reservation = Reservation::new("u1", seat_id());
        reservations.create(&reservation).await.unwrap();
        seats
            .compare_and_set(
                &seat_id(),
                Expected::Any,
                SeatStatus::Reserved,
                Some(reservation.id),
            )
            .await
            .unwrap();

        let updated = ingest
            .apply_hardware_status(&seat_id(), SeatStatus::Maintenance)
            .await
            .unwrap();
        assert_eq!(updated.status, SeatStatus::Maintenance);
        assert_eq!(updated.reservation_id, None);

        let stored = reservations.get(reservation.id).await.unwrap().unwrap();
        assert!(!stored.is_active());
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn reserved_is_not_a_sensor_status() {
        let (ingest, seats, _, sink) = ingest_with_seat().await;

        assert!(matches!(
            ingest
                .apply_hardware_status(&seat_id(), SeatStatus::Reserved)
                .await,
            Err(IngestError::InvalidStatus(SeatStatus::Reserved))
        ));
        let seat = seats.get(&seat_id()).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn provision_train_creates_every_seat() {
        let (ingest, seats, _, sink) = ingest_with_seat().await;
        let layout = LineLayout::for_line("9").unwrap();

        let count = ingest.provision_train("9012", &layout).await.unwrap();
        assert_eq!(count, 6 * 14);
        assert_eq!(seats.list_train("9012").await.unwrap().len(), count);
        // Provisioning is silent.
        assert!(sink.events().is_empty());
    }
}
