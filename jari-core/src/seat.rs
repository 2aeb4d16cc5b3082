use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Composite seat key: train number, car number, seat number.
/// Exposed externally as a single opaque string, e.g. `"2741:3:A1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId {
    pub train_no: String,
    pub car_no: u32,
    pub seat_no: String,
}

impl SeatId {
    pub fn new(train_no: impl Into<String>, car_no: u32, seat_no: impl Into<String>) -> Self {
        Self {
            train_no: train_no.into(),
            car_no,
            seat_no: seat_no.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed seat id: {0}")]
pub struct SeatIdParseError(pub String);

impl FromStr for SeatId {
    type Err = SeatIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (train, car, seat) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(c), Some(n), None) => (t, c, n),
            _ => return Err(SeatIdParseError(s.to_string())),
        };
        if train.is_empty() || seat.is_empty() {
            return Err(SeatIdParseError(s.to_string()));
        }
        let car_no: u32 = car.parse().map_err(|_| SeatIdParseError(s.to_string()))?;
        Ok(SeatId::new(train, car_no, seat))
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.train_no, self.car_no, self.seat_no)
    }
}

impl TryFrom<String> for SeatId {
    type Error = SeatIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatId> for String {
    fn from(id: SeatId) -> Self {
        id.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Occupied,
    Reserved,
    Maintenance,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Occupied => "occupied",
            SeatStatus::Reserved => "reserved",
            SeatStatus::Maintenance => "maintenance",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown seat status: {0}")]
pub struct SeatStatusParseError(pub String);

impl FromStr for SeatStatus {
    type Err = SeatStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "occupied" => Ok(SeatStatus::Occupied),
            "reserved" => Ok(SeatStatus::Reserved),
            "maintenance" => Ok(SeatStatus::Maintenance),
            other => Err(SeatStatusParseError(other.to_string())),
        }
    }
}

/// Priority seats are the designated pregnant-rider seats; only these are
/// reservable. Standard seats still carry sensor state for the seat map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatType {
    Priority,
    Standard,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Priority => "priority",
            SeatType::Standard => "standard",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown seat type: {0}")]
pub struct SeatTypeParseError(pub String);

impl FromStr for SeatType {
    type Err = SeatTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(SeatType::Priority),
            "standard" => Ok(SeatType::Standard),
            other => Err(SeatTypeParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub seat_id: SeatId,
    pub seat_type: SeatType,
    pub status: SeatStatus,
    /// Owning reservation, set iff `status == Reserved`.
    #[serde(rename = "currentReservationId")]
    pub reservation_id: Option<Uuid>,
    /// Never moves backwards for a given seat.
    pub updated_at: DateTime<Utc>,
    /// Bumped on every successful write; viewers use it to drop stale events.
    pub revision: u64,
}

impl Seat {
    pub fn new(seat_id: SeatId, seat_type: SeatType) -> Self {
        Self {
            seat_id,
            seat_type,
            status: SeatStatus::Available,
            reservation_id: None,
            updated_at: Utc::now(),
            revision: 1,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }
}
