pub mod board;
pub mod events;
pub mod layout;
pub mod repository;
pub mod reservation;
pub mod seat;

pub use events::{EventSink, SeatEvent};
pub use reservation::{Reservation, ReservationStatus};
pub use seat::{Seat, SeatId, SeatStatus, SeatType};
