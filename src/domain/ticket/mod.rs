//! Ticket domain module.
//!
//! - `state` - TicketState state machine
//! - `ticket` - Ticket entity with versioned transitions
//! - `lock` - TicketLock ownership record

mod lock;
mod state;
#[allow(clippy::module_inception)]
mod ticket;

pub use lock::TicketLock;
pub use state::TicketState;
pub use ticket::Ticket;
