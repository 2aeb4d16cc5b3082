use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use jari_core::repository::{
    Expected, ReservationRepository, ReservationStoreError, SeatStore, SeatStoreError,
};
use jari_core::reservation::{Reservation, ReservationStatus};
use jari_core::seat::{Seat, SeatId, SeatStatus};

/// In-memory seat store for tests and Redis-less development. The write
/// lock serializes read-check-write, which is what makes the
/// compare-and-set linearizable per seat.
#[derive(Default)]
pub struct MemorySeatStore {
    seats: RwLock<HashMap<SeatId, Seat>>,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn precondition_holds(seat: &Seat, expected: Expected) -> bool {
    match expected {
        Expected::Status(status) => seat.status == status,
        Expected::Reservation(reservation_id) => seat.reservation_id == reservation_id,
        Expected::Any => true,
    }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn get(&self, seat_id: &SeatId) -> Result<Option<Seat>, SeatStoreError> {
        Ok(self.seats.read().await.get(seat_id).cloned())
    }

    async fn list_car(&self, train_no: &str, car_no: u32) -> Result<Vec<Seat>, SeatStoreError> {
        let seats = self.seats.read().await;
        let mut out: Vec<Seat> = seats
            .values()
            .filter(|s| s.seat_id.train_no == train_no && s.seat_id.car_no == car_no)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.seat_id.seat_no.cmp(&b.seat_id.seat_no));
        Ok(out)
    }

    async fn list_train(&self, train_no: &str) -> Result<Vec<Seat>, SeatStoreError> {
        let seats = self.seats.read().await;
        let mut out: Vec<Seat> = seats
            .values()
            .filter(|s| s.seat_id.train_no == train_no)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.seat_id.car_no, &a.seat_id.seat_no).cmp(&(b.seat_id.car_no, &b.seat_id.seat_no))
        });
        Ok(out)
    }

    async fn insert(&self, seat: Seat) -> Result<(), SeatStoreError> {
        self.seats.write().await.insert(seat.seat_id.clone(), seat);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        seat_id: &SeatId,
        expected: Expected,
        new_status: SeatStatus,
        reservation_id: Option<Uuid>,
    ) -> Result<Seat, SeatStoreError> {
        let mut seats = self.seats.write().await;
        let seat = seats
            .get_mut(seat_id)
            .ok_or_else(|| SeatStoreError::NotFound(seat_id.to_string()))?;

        if !precondition_holds(seat, expected) {
            return Err(SeatStoreError::Conflict(seat_id.to_string()));
        }

        seat.status = new_status;
        seat.reservation_id = reservation_id;
        seat.updated_at = seat.updated_at.max(Utc::now());
        seat.revision += 1;
        Ok(seat.clone())
    }
}

/// In-memory reservation history, mirroring the Postgres repository.
#[derive(Default)]
pub struct MemoryReservations {
    reservations: RwLock<HashMap<Uuid, Reservation>>,
}

impl MemoryReservations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationRepository for MemoryReservations {
    async fn create(&self, reservation: &Reservation) -> Result<(), ReservationStoreError> {
        self.reservations
            .write()
            .await
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, ReservationStoreError> {
        Ok(self.reservations.read().await.get(&id).cloned())
    }

    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, ReservationStoreError> {
        let mut reservations = self.reservations.write().await;
        let reservation = reservations
            .get_mut(&id)
            .ok_or(ReservationStoreError::NotFound(id))?;

        if reservation.status != ReservationStatus::Reserved {
            return Ok(false);
        }
        reservation.status = ReservationStatus::Cancelled;
        reservation.updated_at = at;
        Ok(true)
    }

    async fn find_active_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Reservation>, ReservationStoreError> {
        Ok(self
            .reservations
            .read()
            .await
            .values()
            .find(|r| r.user_id == user_id && r.is_active())
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Reservation>, ReservationStoreError> {
        let mut out: Vec<Reservation> = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jari_core::seat::SeatType;

    fn seat(seat_no: &str) -> Seat {
        Seat::new(SeatId::new("2741", 3, seat_no), SeatType::Priority)
    }

    #[tokio::test]
    async fn cas_succeeds_only_when_precondition_holds() {
        let store = MemorySeatStore::new();
        let id = SeatId::new("2741", 3, "A1");
        store.insert(seat("A1")).await.unwrap();

        let rid = Uuid::new_v4();
        let updated = store
            .compare_and_set(
                &id,
                Expected::Status(SeatStatus::Available),
                SeatStatus::Reserved,
                Some(rid),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, SeatStatus::Reserved);
        assert_eq!(updated.reservation_id, Some(rid));
        assert_eq!(updated.revision, 2);

        // Same precondition no longer holds.
        let err = store
            .compare_and_set(
                &id,
                Expected::Status(SeatStatus::Available),
                SeatStatus::Reserved,
                Some(Uuid::new_v4()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SeatStoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn cas_with_reservation_precondition() {
        let store = MemorySeatStore::new();
        let id = SeatId::new("2741", 3, "A1");
        store.insert(seat("A1")).await.unwrap();

        let rid = Uuid::new_v4();
        store
            .compare_and_set(
                &id,
                Expected::Status(SeatStatus::Available),
                SeatStatus::Reserved,
                Some(rid),
            )
            .await
            .unwrap();

        // Wrong owner loses, right owner releases.
        let err = store
            .compare_and_set(
                &id,
                Expected::Reservation(Some(Uuid::new_v4())),
                SeatStatus::Available,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SeatStoreError::Conflict(_)));

        let released = store
            .compare_and_set(
                &id,
                Expected::Reservation(Some(rid)),
                SeatStatus::Available,
                None,
            )
            .await
            .unwrap();
        assert_eq!(released.status, SeatStatus::Available);
        assert_eq!(released.reservation_id, None);
    }

    #[tokio::test]
    async fn cas_on_missing_seat_is_not_found() {
        let store = MemorySeatStore::new();
        let err = store
            .compare_and_set(
                &SeatId::new("0000", 1, "A1"),
                Expected::Any,
                SeatStatus::Available,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SeatStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn updated_at_never_moves_backwards() {
        let store = MemorySeatStore::new();
        let id = SeatId::new("2741", 3, "A1");
        let mut s = seat("A1");
        // Seed with a timestamp in the future of the next write.
        s.updated_at = Utc::now() + chrono::Duration::hours(1);
        let seeded_at = s.updated_at;
        store.insert(s).await.unwrap();

        let updated = store
            .compare_and_set(&id, Expected::Any, SeatStatus::Occupied, None)
            .await
            .unwrap();
        assert!(updated.updated_at >= seeded_at);
    }

    #[tokio::test]
    async fn list_car_returns_sorted_seats() {
        let store = MemorySeatStore::new();
        store.insert(seat("B2")).await.unwrap();
        store.insert(seat("A1")).await.unwrap();
        store
            .insert(Seat::new(SeatId::new("2741", 4, "A1"), SeatType::Standard))
            .await
            .unwrap();

        let car = store.list_car("2741", 3).await.unwrap();
        assert_eq!(car.len(), 2);
        assert_eq!(car[0].seat_id.seat_no, "A1");
        assert_eq!(store.list_train("2741").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn reservation_cancel_transitions_once() {
        let repo = MemoryReservations::new();
        let r = Reservation::new("user-1", SeatId::new("2741", 3, "A1"));
        repo.create(&r).await.unwrap();

        assert!(repo.cancel(r.id, Utc::now()).await.unwrap());
        assert!(!repo.cancel(r.id, Utc::now()).await.unwrap());
        assert!(repo
            .find_active_for_user("user-1")
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.list_for_user("user-1").await.unwrap().len(), 1);
    }
}
