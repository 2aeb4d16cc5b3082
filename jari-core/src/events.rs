use serde::{Deserialize, Serialize};

use crate::seat::Seat;

/// Server -> viewer realtime message. Each event carries the full updated
/// seat record, so delivery order across seats does not matter and applying
/// the same event twice is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SeatEvent {
    #[serde(rename = "SEAT_STATUS_UPDATED")]
    SeatStatusUpdated(Seat),
}

impl SeatEvent {
    pub fn seat(&self) -> &Seat {
        match self {
            SeatEvent::SeatStatusUpdated(seat) => seat,
        }
    }

    pub fn wire_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Fan-out trigger injected into every seat-store writer. Exactly one
/// `publish` per successful write; delivery is fire-and-forget and must not
/// suspend the publishing task.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: SeatEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seat::{Seat, SeatId, SeatType};

    #[test]
    fn event_wire_shape_is_type_plus_payload() {
        let seat = Seat::new(SeatId::new("2741", 3, "A1"), SeatType::Priority);
        let event = SeatEvent::SeatStatusUpdated(seat);
        let json: serde_json::Value = serde_json::from_str(&event.wire_json().unwrap()).unwrap();
        assert_eq!(json["type"], "SEAT_STATUS_UPDATED");
        assert_eq!(json["payload"]["seatId"], "2741:3:A1");
    }

    #[test]
    fn event_round_trips() {
        let seat = Seat::new(SeatId::new("2741", 3, "A1"), SeatType::Standard);
        let event = SeatEvent::SeatStatusUpdated(seat);
        let back: SeatEvent = serde_json::from_str(&event.wire_json().unwrap()).unwrap();
        assert_eq!(back, event);
    }
}
