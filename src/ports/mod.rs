//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `TicketRepository` - Transactional ticket transitions
//! - `TicketReader` - Ticket listings and checkout views
//! - `CheckoutSessionRepository` - One active payment attempt per user
//! - `AuthTokenStore` - Purging expired one-time tokens
//!
//! ## Collaborator Ports
//!
//! - `CatalogReader` - Schedules, halls and seats
//! - `PaymentGateway` - Remote checkout sessions and webhooks
//! - `SessionValidator` - Bearer token validation
//! - `Clock` - Current time

mod auth_token_store;
mod catalog_reader;
mod checkout_session_repository;
mod clock;
mod payment_gateway;
mod session_validator;
mod ticket_reader;
mod ticket_repository;

pub use auth_token_store::AuthTokenStore;
pub use catalog_reader::{CatalogReader, HallInfo, ScheduleInfo, SeatInfo};
pub use checkout_session_repository::{CheckoutSessionRepository, FulfillOutcome};
pub use clock::{Clock, SystemClock};
pub use payment_gateway::{
    OpenSessionRequest, PaymentError, PaymentErrorCode, PaymentGateway, PaymentStatus,
    RemoteSession, RemoteSessionStatus, WebhookEvent, WebhookEventType,
};
pub use session_validator::SessionValidator;
pub use ticket_reader::{TicketReader, TicketSeat};
pub use ticket_repository::{
    CreateTickets, ExpiredLockSweep, LockTicket, TicketRepository, UnlockTicket,
};
