use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use jari_core::events::{EventSink, SeatEvent};
use jari_core::repository::{
    Expected, ReservationRepository, ReservationStoreError, SeatStore, SeatStoreError,
};
use jari_core::reservation::{Reservation, ReservationStatus};
use jari_core::seat::{Seat, SeatId, SeatStatus, SeatType};

/// Enforces the reservation rules on top of the seat store: at most one
/// active reservation per seat, at most one per rider. The seat
/// compare-and-set is the commit point; the reservation record is created
/// tentatively beforehand and rolled back if the seat race is lost.
pub struct ReservationManager {
    seats: Arc<dyn SeatStore>,
    reservations: Arc<dyn ReservationRepository>,
    events: Arc<dyn EventSink>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReserveError {
    #[error("seat not found: {0}")]
    SeatNotFound(SeatId),

    #[error("seat is not available: {0}")]
    SeatUnavailable(SeatId),

    #[error("seat is not a priority seat: {0}")]
    NotPrioritySeat(SeatId),

    #[error("user already holds an active reservation: {0}")]
    ActiveReservationExists(Uuid),

    #[error("storage failure: {0}")]
    Store(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("reservation not found: {0}")]
    ReservationNotFound(Uuid),

    #[error("only the owner may cancel a reservation")]
    NotOwner,

    #[error("reservation already cancelled: {0}")]
    AlreadyCancelled(Uuid),

    #[error("seat not found: {0}")]
    SeatNotFound(SeatId),

    #[error("storage failure: {0}")]
    Store(String),
}

impl ReservationManager {
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

    pub async fn reserve(
        &self,
        seat_id: &SeatId,
        user_id: &str,
    ) -> Result<Reservation, ReserveError> {
        let seat = self
            .seats
            .get(seat_id)
            .await
            .map_err(|e| ReserveError::Store(e.to_string()))?
            .ok_or_else(|| ReserveError::SeatNotFound(seat_id.clone()))?;

        if seat.seat_type != SeatType::Priority {
            return Err(ReserveError::NotPrioritySeat(seat_id.clone()));
        }
        if !seat.is_available() {
            return Err(ReserveError::SeatUnavailable(seat_id.clone()));
        }
        if let Some(active) = self
            .reservations
            .find_active_for_user(user_id)
            .await
            .map_err(|e| ReserveError::Store(e.to_string()))?
        {
            return Err(ReserveError::ActiveReservationExists(active.id));
        }

        // Tentative record first; the seat compare-and-set below is the
        // commit point.
        let reservation = Reservation::new(user_id, seat_id.clone());
        self.reservations
            .create(&reservation)
            .await
            .map_err(|e| ReserveError::Store(e.to_string()))?;

        match self
            .seats
            .compare_and_set(
                seat_id,
                Expected::Status(SeatStatus::Available),
                SeatStatus::Reserved,
                Some(reservation.id),
            )
            .await
        {
            Ok(updated) => {
                self.events.publish(SeatEvent::SeatStatusUpdated(updated));
                Ok(reservation)
            }
            Err(SeatStoreError::Conflict(_)) => {
                self.roll_back(reservation.id).await;
                Err(ReserveError::SeatUnavailable(seat_id.clone()))
            }
            Err(SeatStoreError::NotFound(_)) => {
                self.roll_back(reservation.id).await;
                Err(ReserveError::SeatNotFound(seat_id.clone()))
            }
            Err(e) => {
                self.roll_back(reservation.id).await;
                Err(ReserveError::Store(e.to_string()))
            }
        }
    }

    /// Compensating write for a lost seat race. A failure here leaves a
    /// stranded `reserved` record that no seat references; it is surfaced
    /// in the log rather than retried.
    async fn roll_back(&self, reservation_id: Uuid) {
        if let Err(e) = self.reservations.cancel(reservation_id, Utc::now()).await {
            tracing::error!(
                reservation = %reservation_id,
                "failed to roll back tentative reservation: {}",
                e
            );
        }
    }

    pub async fn cancel(&self, reservation_id: Uuid, user_id: &str) -> Result<Seat, CancelError> {
        let reservation = self
            .reservations
            .get(reservation_id)
            .await
            .map_err(|e| CancelError::Store(e.to_string()))?
            .ok_or(CancelError::ReservationNotFound(reservation_id))?;

        if reservation.user_id != user_id {
            return Err(CancelError::NotOwner);
        }
        if reservation.status == ReservationStatus::Cancelled {
            return Err(CancelError::AlreadyCancelled(reservation_id));
        }

        // Check the seat before mutating anything.
        self.seats
            .get(&reservation.seat_id)
            .await
            .map_err(|e| CancelError::Store(e.to_string()))?
            .ok_or_else(|| CancelError::SeatNotFound(reservation.seat_id.clone()))?;

        let transitioned = self
            .reservations
            .cancel(reservation_id, Utc::now())
            .await
            .map_err(|e| match e {
                ReservationStoreError::NotFound(id) => CancelError::ReservationNotFound(id),
                other => CancelError::Store(other.to_string()),
            })?;
        if !transitioned {
            return Err(CancelError::AlreadyCancelled(reservation_id));
        }

        // Only the owning cancel path may clear this reservation, so the
        // seat release needs no precondition.
        match self
            .seats
            .compare_and_set(
                &reservation.seat_id,
                Expected::Any,
                SeatStatus::Available,
                None,
            )
            .await
        {
            Ok(updated) => {
                self.events
                    .publish(SeatEvent::SeatStatusUpdated(updated.clone()));
                Ok(updated)
            }
            Err(SeatStoreError::NotFound(_)) => {
                Err(CancelError::SeatNotFound(reservation.seat_id.clone()))
            }
            Err(e) => Err(CancelError::Store(e.to_string())),
        }
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<Reservation>, ReservationStoreError> {
        self.reservations.list_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    async fn manager_with_seat() -> (ReservationManager, Arc<MemorySeatStore>, Arc<RecordingSink>) {
        let seats = Arc::new(MemorySeatStore::new());
        let sink = RecordingSink::new();
        seats
            .insert(Seat::new(seat_id(), SeatType::Priority))
            .await
            .unwrap();
        let manager = ReservationManager::new(
            seats.clone(),
            Arc::new(MemoryReservations::new()),
            sink.clone(),
        );
        (manager, seats, sink)
    }

    #[tokio::test]
    async fn reserve_marks_seat_and_publishes_once() {
        let (manager, seats, sink) = manager_with_seat().await;

        let reservation = manager.reserve(&seat_id(), "u1").await.unwrap();

        let seat = seats.get(&seat_id()).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Reserved);
        assert_eq!(seat.reservation_id, Some(reservation.id));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seat().status, SeatStatus::Reserved);
    }

    #[tokio::test]
    async fn reserve_unknown_seat_fails() {
        let (manager, _, sink) = manager_with_seat().await;
        let missing = SeatId::new("0000", 1, "A1");
        assert!(matches!(
            manager.reserve(&missing, "u1").await,
            Err(ReserveError::SeatNotFound(_))
        ));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn reserve_standard_seat_is_rejected() {
        let seats = Arc::new(MemorySeatStore::new());
        let standard = SeatId::new("2741", 3, "B3");
        seats
            .insert(Seat::new(standard.clone(), SeatType::Standard))
            .await
            .unwrap();
        let manager = ReservationManager::new(
            seats,
            Arc::new(MemoryReservations::new()),
            RecordingSink::new(),
        );

        assert!(matches!(
            manager.reserve(&standard, "u1").await,
            Err(ReserveError::NotPrioritySeat(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_reserves_have_exactly_one_winner() {
        let (manager, seats, sink) = manager_with_seat().await;

        let (a, b) = tokio::join!(
            manager.reserve(&seat_id(), "u1"),
            manager.reserve(&seat_id(), "u2")
        );

        let winners: Vec<&Reservation> = [a.as_ref(), b.as_ref()]
            .into_iter()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(winners.len(), 1);
        let loser = if a.is_ok() { &b } else { &a };
        assert!(matches!(loser, Err(ReserveError::SeatUnavailable(_))));

        // Seat points at the winner and exactly one active record survives;
        // the loser's tentative record was compensated away.
        let seat = seats.get(&seat_id()).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Reserved);
        assert_eq!(seat.reservation_id, Some(winners[0].id));

        let active_u1 = manager
            .reservations
            .find_active_for_user("u1")
            .await
            .unwrap();
        let active_u2 = manager
            .reservations
            .find_active_for_user("u2")
            .await
            .unwrap();
        assert_eq!(
            active_u1.is_some() as usize + active_u2.is_some() as usize,
            1
        );

        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn cancel_releases_seat_and_double_cancel_is_rejected() {
        let (manager, seats, sink) = manager_with_seat().await;
        let reservation = manager.reserve(&seat_id(), "u1").await.unwrap();

        let released = manager.cancel(reservation.id, "u1").await.unwrap();
        assert_eq!(released.status, SeatStatus::Available);
        assert_eq!(released.reservation_id, None);

        let seat_before = seats.get(&seat_id()).await.unwrap().unwrap();
        assert!(matches!(
            manager.cancel(reservation.id, "u1").await,
            Err(CancelError::AlreadyCancelled(_))
        ));
        // A rejected cancel does not touch the seat.
        let seat_after = seats.get(&seat_id()).await.unwrap().unwrap();
        assert_eq!(seat_before, seat_after);

        // reserve -> cancel -> reserve again succeeds.
        assert!(manager.reserve(&seat_id(), "u2").await.is_ok());
        assert_eq!(sink.events().len(), 3);
    }

    #[tokio::test]
    async fn cancel_by_non_owner_is_forbidden() {
        let (manager, seats, _) = manager_with_seat().await;
        let reservation = manager.reserve(&seat_id(), "u1").await.unwrap();

        assert!(matches!(
            manager.cancel(reservation.id, "u2").await,
            Err(CancelError::NotOwner)
        ));
        let seat = seats.get(&seat_id()).await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Reserved);
    }

    #[tokio::test]
    async fn one_active_reservation_per_user() {
        let (manager, seats, _) = manager_with_seat().await;
        let other = SeatId::new("2741", 4, "A1");
        seats
            .insert(Seat::new(other.clone(), SeatType::Priority))
            .await
            .unwrap();

        let first = manager.reserve(&seat_id(), "u1").await.unwrap();
        assert!(matches!(
            manager.reserve(&other, "u1").await,
            Err(ReserveError::ActiveReservationExists(id)) if id == first.id
        ));

        // After cancelling, the user may reserve again.
        manager.cancel(first.id, "u1").await.unwrap();
        assert!(manager.reserve(&other, "u1").await.is_ok());
    }

    #[tokio::test]
    async fn history_returns_all_reservations_newest_first() {
        let (manager, _, _) = manager_with_seat().await;
        let r = manager.reserve(&seat_id(), "u1").await.unwrap();
        manager.cancel(r.id, "u1").await.unwrap();
        let again = manager.reserve(&seat_id(), "u1").await.unwrap();

        let history = manager.history("u1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, again.id);
        assert_eq!(history[1].status, ReservationStatus::Cancelled);
    }
}
