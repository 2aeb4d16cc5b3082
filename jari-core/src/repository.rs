use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::reservation::Reservation;
use crate::seat::{Seat, SeatId, SeatStatus};

/// Precondition for a conditional seat write. `Any` is the unconditional
/// form used by the sensor maintenance path and the owning cancel path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expected {
    Status(SeatStatus),
    Reservation(Option<Uuid>),
    Any,
}

#[derive(Debug, thiserror::Error)]
pub enum SeatStoreError {
    #[error("seat not found: {0}")]
    NotFound(String),

    #[error("seat state changed concurrently: {0}")]
    Conflict(String),

    #[error("seat store backend failure: {0}")]
    Backend(String),
}

/// Single source of truth for seat state. Writes to one seat are
/// linearizable: two writers cannot both observe a precondition and both
/// commit. Every successful write bumps `revision` and never moves
/// `updated_at` backwards.
#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn get(&self, seat_id: &SeatId) -> Result<Option<Seat>, SeatStoreError>;

    async fn list_car(&self, train_no: &str, car_no: u32) -> Result<Vec<Seat>, SeatStoreError>;

    async fn list_train(&self, train_no: &str) -> Result<Vec<Seat>, SeatStoreError>;

    /// Provisioning write; overwrites any existing record for the seat.
    async fn insert(&self, seat: Seat) -> Result<(), SeatStoreError>;

    /// Conditional write. Fails with `Conflict` when `expected` no longer
    /// holds, which is how two racing reservation attempts are reduced to
    /// one winner.
    async fn compare_and_set(
        &self,
        seat_id: &SeatId,
        expected: Expected,
        new_status: SeatStatus,
        reservation_id: Option<Uuid>,
    ) -> Result<Seat, SeatStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationStoreError {
    #[error("reservation not found: {0}")]
    NotFound(Uuid),

    #[error("reservation store backend failure: {0}")]
    Backend(String),
}

/// Durable reservation history. Records are never deleted.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, reservation: &Reservation) -> Result<(), ReservationStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, ReservationStoreError>;

    /// Conditional `reserved -> cancelled` transition. Returns `false` when
    /// the reservation was not in `reserved` state, so concurrent cancels
    /// resolve to a single winner.
    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, ReservationStoreError>;

    async fn find_active_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Reservation>, ReservationStoreError>;

    async fn list_for_user(&self, user_id: &str)
        -> Result<Vec<Reservation>, ReservationStoreError>;
}
