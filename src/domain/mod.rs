//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, money, errors)
//! - `ticket` - Ticket state machine, entity and lock record
//! - `checkout` - Checkout session and line-item pricing
//! - `reservation` - Use-case error taxonomy
//! - `payment` - Gateway webhook signature verification

pub mod checkout;
pub mod foundation;
pub mod payment;
pub mod reservation;
pub mod ticket;
