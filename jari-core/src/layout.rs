use serde::{Deserialize, Serialize};

use crate::seat::{Seat, SeatId, SeatType};

/// Per-line car and seat layout, used to provision a train's seats at
/// initialization. Seat numbers are bench letter + position, e.g. `"A1"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineLayout {
    pub line: String,
    pub cars_per_train: u32,
    pub seats_per_car: Vec<String>,
    /// Subset of `seats_per_car` designated as priority (pregnant-rider) seats.
    pub priority_seats: Vec<String>,
}

impl LineLayout {
    /// Layout for a line by its number, e.g. `"2"`. Lines 1-9 use the
    /// standard two-bench car; line 2 runs longer trains.
    pub fn for_line(line: &str) -> Option<Self> {
        let cars_per_train = match line {
            "2" => 10,
            "1" | "3" | "4" | "5" | "6" | "7" | "8" => 8,
            "9" => 6,
            _ => return None,
        };
        let mut seats_per_car = Vec::new();
        for bench in ["A", "B"] {
            for pos in 1..=7 {
                seats_per_car.push(format!("{bench}{pos}"));
            }
        }
        Some(Self {
            line: line.to_string(),
            cars_per_train,
            // One priority seat at each bench end, nearest the doors.
            priority_seats: vec!["A1".to_string(), "B1".to_string()],
            seats_per_car,
        })
    }

    pub fn seat_type_of(&self, seat_no: &str) -> SeatType {
        if self.priority_seats.iter().any(|s| s == seat_no) {
            SeatType::Priority
        } else {
            SeatType::Standard
        }
    }

    /// All seats of one car, freshly `available`.
    pub fn seats_for_car(&self, train_no: &str, car_no: u32) -> Vec<Seat> {
        self.seats_per_car
            .iter()
            .map(|seat_no| {
                Seat::new(
                    SeatId::new(train_no, car_no, seat_no.clone()),
                    self.seat_type_of(seat_no),
                )
            })
            .collect()
    }

    /// All seats of every car of a train.
    pub fn seats_for_train(&self, train_no: &str) -> Vec<Seat> {
        (1..=self.cars_per_train)
            .flat_map(|car_no| self.seats_for_car(train_no, car_no))
            .collect()
    }
}
