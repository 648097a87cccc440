//! PostgreSQL adapters - Database implementations for the store ports.
//!
//! - `PostgresTicketRepository` - serializable ticket transitions
//! - `PostgresTicketReader` - listing and checkout views
//! - `PostgresCheckoutSessionRepository` - sessions and fulfillment
//! - `PostgresCatalogReader` - schedules, halls and seats
//! - `PostgresAuthTokenStore` - expired token purge
//!
//! Every operation runs under the configured `database.operation_timeout_secs`.

mod auth_tokens;
mod catalog;
mod checkout_sessions;
mod support;
mod ticket_reader;
mod tickets;

pub use auth_tokens::PostgresAuthTokenStore;
pub use catalog::PostgresCatalogReader;
pub use checkout_sessions::PostgresCheckoutSessionRepository;
pub use ticket_reader::PostgresTicketReader;
pub use tickets::PostgresTicketRepository;
