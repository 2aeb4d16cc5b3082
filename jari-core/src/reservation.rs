use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::seat::SeatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown reservation status: {0}")]
pub struct ReservationStatusParseError(pub String);

impl FromStr for ReservationStatus {
    type Err = ReservationStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(ReservationStatus::Reserved),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(ReservationStatusParseError(other.to_string())),
        }
    }
}

/// A rider's claim on a seat. Transitions `reserved -> cancelled` exactly
/// once and is kept forever as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: String,
    pub seat_id: SeatId,
    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(user_id: impl Into<String>, seat_id: SeatId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            seat_id,
            status: ReservationStatus::Reserved,
            reserved_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Reserved
    }
}
