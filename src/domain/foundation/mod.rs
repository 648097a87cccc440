//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, money, the state machine trait and error types
//! that form the vocabulary of the reservation domain.

mod auth;
mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    CinemaId, HallId, MovieId, PaymentSessionId, ScheduleId, SeatId, TicketId, UserId,
};
pub use money::Money;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
