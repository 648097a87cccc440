//! HTTP adapters - REST API over the reservation handlers.

pub mod error;
pub mod middleware;
pub mod reservation;
pub mod router;

pub use error::{ApiError, ErrorResponse};
pub use reservation::{reservation_routes, ReservationAppState, SIGNATURE_HEADER};
pub use router::{app_router, health};
