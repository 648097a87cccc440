//! HTTP adapter for reservation endpoints.
//!
//! - `GET /api/schedules/:id/tickets` - List a schedule's tickets
//! - `POST /api/schedules/:id/tickets` - Generate tickets (cinema owner)
//! - `POST /api/tickets/:id/lock` - Lock a ticket
//! - `POST /api/tickets/:id/unlock` - Unlock a ticket
//! - `GET /api/checkout` - View locked tickets and open session
//! - `POST /api/checkout` - Begin checkout
//! - `GET /api/checkout/cancel` - Provider cancel redirect
//! - `POST /api/webhooks/payment` - Provider webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ReservationAppState, SIGNATURE_HEADER};
pub use routes::reservation_routes;
