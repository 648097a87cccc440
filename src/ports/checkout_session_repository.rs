//! Checkout session store port.
//!
//! At most one session exists per user. Fulfillment touches tickets as well,
//! so implementations share a transaction boundary with the ticket store.

use async_trait::async_trait;

use crate::domain::checkout::CheckoutSession;
use crate::domain::foundation::{DomainError, PaymentSessionId, TicketId, Timestamp, UserId};

#[async_trait]
pub trait CheckoutSessionRepository: Send + Sync {
    /// Persists a new session.
    ///
    /// In the same atomic step the user's current locks are compared with
    /// `session.ticket_ids`; a lock that landed after the basket was priced
    /// makes the create fail.
    ///
    /// # Errors
    ///
    /// - `CheckoutInProgress` if the user already has a session
    /// - `Conflict` if the user's locks differ from the priced set
    /// - `DatabaseError` / `Timeout` on persistence failure
    async fn create(&self, session: &CheckoutSession) -> Result<(), DomainError>;

    async fn find_by_user(&self, user_id: &UserId)
        -> Result<Option<CheckoutSession>, DomainError>;

    async fn find_by_session_id(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<Option<CheckoutSession>, DomainError>;

    /// Sells the session's priced tickets and deletes the session,
    /// atomically. Any other lock the user holds is left alone.
    ///
    /// Fails with `Conflict` and changes nothing if a priced ticket is no
    /// longer locked by the user.
    ///
    /// When no session matches `(session_id, user_id)` nothing changes and
    /// `FulfillOutcome::NoSession` is returned; duplicate notifications land here.
    async fn fulfill(
        &self,
        session_id: &PaymentSessionId,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<FulfillOutcome, DomainError>;

    /// Deletes the session row. Returns `false` if there was none.
    ///
    /// Locked tickets are left alone.
    async fn delete_by_session_id(&self, session_id: &PaymentSessionId)
        -> Result<bool, DomainError>;

    /// Up to `limit` sessions created strictly before `cutoff` whose
    /// `next_check_at` is unset or not after `now`.
    ///
    /// Ordered by `next_check_at`, falling back to `created_at`, so sessions
    /// that were just deferred go to the back of the queue.
    async fn find_due(
        &self,
        cutoff: Timestamp,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, DomainError>;

    /// Postpones reconciliation of a session until `until`. Returns `false`
    /// if the session no longer exists.
    async fn defer(
        &self,
        session_id: &PaymentSessionId,
        until: Timestamp,
    ) -> Result<bool, DomainError>;
}

/// Result of a fulfillment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillOutcome {
    /// Tickets moved to `Sold` and the session was removed.
    Fulfilled { sold: Vec<TicketId> },
    /// No matching session; already fulfilled or expired.
    NoSession,
}
