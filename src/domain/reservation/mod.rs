//! Reservation use-case vocabulary shared by handlers and adapters.

mod errors;

pub use errors::ReservationError;
