//! Checkout domain module.
//!
//! - `session` - CheckoutSession, the single active payment attempt per user
//! - `line_item` - pricing of locked tickets for the gateway

mod line_item;
mod session;

pub use line_item::{build_line_items, total, LineItem, LockedTicket};
pub use session::CheckoutSession;
