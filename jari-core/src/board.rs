use std::collections::HashMap;

use crate::events::SeatEvent;
use crate::seat::{Seat, SeatId};

/// Viewer-side seat state, as every seat-map page maintains it: primed from
/// an initial full-state fetch, then merged with broadcast events.
///
/// Merging is a full-state replace. An event whose revision is older than
/// the local copy is dropped, so late or duplicated deliveries cannot roll
/// the view backwards.
#[derive(Debug, Default)]
pub struct SeatBoard {
    seats: HashMap<SeatId, Seat>,
}

impl SeatBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prime the board from the initial fetch (replaces prior contents).
    pub fn load(&mut self, seats: impl IntoIterator<Item = Seat>) {
        self.seats = seats
            .into_iter()
            .map(|seat| (seat.seat_id.clone(), seat))
            .collect();
    }

    /// Merge one broadcast event. Returns `false` when the event was stale
    /// and dropped.
    pub fn apply(&mut self, event: &SeatEvent) -> bool {
        let incoming = event.seat();
        if let Some(current) = self.seats.get(&incoming.seat_id) {
            if current.revision > incoming.revision {
                tracing::debug!(
                    seat = %incoming.seat_id,
                    local = current.revision,
                    incoming = incoming.revision,
                    "dropping stale seat event"
                );
                return false;
            }
        }
        self.seats
            .insert(incoming.seat_id.clone(), incoming.clone());
        true
    }

    pub fn get(&self, seat_id: &SeatId) -> Option<&Seat> {
        self.seats.get(seat_id)
    }

    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seat::{SeatStatus, SeatType};

    fn seat(revision: u64, status: SeatStatus) -> Seat {
        let mut s = Seat::new(SeatId::new("2741", 3, "A1"), SeatType::Priority);
        s.revision = revision;
        s.status = status;
        s
    }

    #[test]
    fn applying_the_same_event_twice_is_idempotent() {
        let mut board = SeatBoard::new();
        let event = SeatEvent::SeatStatusUpdated(seat(2, SeatStatus::Occupied));

        assert!(board.apply(&event));
        let once: Vec<Seat> = board.seats().cloned().collect();

        assert!(board.apply(&event));
        let twice: Vec<Seat> = board.seats().cloned().collect();

        assert_eq!(once, twice);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn stale_event_is_dropped() {
        let mut board = SeatBoard::new();
        board.load([seat(5, SeatStatus::Reserved)]);

        let stale = SeatEvent::SeatStatusUpdated(seat(3, SeatStatus::Available));
        assert!(!board.apply(&stale));
        assert_eq!(
            board.get(&SeatId::new("2741", 3, "A1")).unwrap().status,
            SeatStatus::Reserved
        );
    }

    #[test]
    fn newer_event_replaces_local_state() {
        let mut board = SeatBoard::new();
        board.load([seat(1, SeatStatus::Available)]);

        let update = SeatEvent::SeatStatusUpdated(seat(2, SeatStatus::Occupied));
        assert!(board.apply(&update));
        assert_eq!(
            board.get(&SeatId::new("2741", 3, "A1")).unwrap().status,
            SeatStatus::Occupied
        );
    }

    #[test]
    fn event_for_unknown_seat_is_added() {
        let mut board = SeatBoard::new();
        assert!(board.apply(&SeatEvent::SeatStatusUpdated(seat(1, SeatStatus::Available))));
        assert_eq!(board.len(), 1);
    }
}
