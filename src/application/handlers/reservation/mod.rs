//! Reservation handlers.
//!
//! Command and query handlers for the seat reservation lifecycle:
//!
//! ## Commands
//! - Generating a schedule's tickets (cinema owner only)
//! - Locking and unlocking tickets
//! - Beginning, fulfilling, expiring and cancelling checkouts
//! - Reconciling a checkout with the payment provider
//! - Processing payment webhooks
//!
//! ## Queries
//! - Listing a schedule's tickets
//! - Viewing the caller's checkout

mod access;
mod begin_checkout;
mod cancel_checkout;
mod expire_checkout;
mod fulfill_checkout;
mod generate_tickets;
mod get_checkout;
mod handle_payment_webhook;
mod list_tickets;
mod lock_ticket;
mod reconcile_checkout;
mod unlock_ticket;

#[cfg(test)]
mod test_support;

// Commands
pub use begin_checkout::{
    BeginCheckoutCommand, BeginCheckoutHandler, BeginCheckoutResult, CheckoutSettings,
};
pub use cancel_checkout::{CancelCheckoutCommand, CancelCheckoutHandler, CancelCheckoutResult};
pub use expire_checkout::{ExpireCheckoutCommand, ExpireCheckoutHandler};
pub use fulfill_checkout::{
    FulfillCheckoutCommand, FulfillCheckoutHandler, FulfillCheckoutResult,
};
pub use generate_tickets::{GenerateTicketsCommand, GenerateTicketsHandler, GenerateTicketsResult};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
pub use lock_ticket::{LockTicketCommand, LockTicketHandler, LockTicketResult};
pub use reconcile_checkout::{
    ReconcileCheckoutCommand, ReconcileCheckoutHandler, ReconcileOutcome,
};
pub use unlock_ticket::{UnlockTicketCommand, UnlockTicketHandler};

// Queries
pub use get_checkout::{CheckoutView, GetCheckoutHandler, GetCheckoutQuery};
pub use list_tickets::{ListTicketsHandler, ListTicketsQuery, ListTicketsResult};
