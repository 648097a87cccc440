//! Ticket store port (write side).
//!
//! Every state change goes through this port. Implementations must make
//! `lock`, `unlock` and each ticket released by `unlock_all_expired` atomic
//! across the ticket row and its ownership record.
//!
//! # Design
//!
//! - **Serializable**: the read that decides and the write that commits happen
//!   in one transaction; a concurrent writer makes one side fail with a conflict
//! - **Versioned**: each successful transition bumps the ticket version
//! - **Idempotent creation**: one ticket per (schedule, seat), duplicates skipped

use async_trait::async_trait;

use crate::domain::foundation::{
    DomainError, Money, ScheduleId, SeatId, TicketId, Timestamp, UserId,
};
use crate::domain::ticket::Ticket;

/// Repository port for ticket persistence and transitions.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Find a ticket by id. Returns `None` if it does not exist.
    async fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, DomainError>;

    /// Inserts an unsold ticket for every seat that has none for this schedule.
    ///
    /// Returns the number of tickets actually created.
    async fn create_all_for_schedule(
        &self,
        request: CreateTickets,
    ) -> Result<u64, DomainError>;

    /// `Unsold -> Locked` plus the ownership record, in one transaction.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound` if the ticket does not exist
    /// - `TicketUnavailable` if the ticket is not `Unsold`
    /// - `VersionMismatch` if `expected_version` is stale
    /// - `ScheduleStarted` if the showing has begun
    /// - `CheckoutInProgress` if the user has an open checkout session
    /// - `Conflict` if the transaction lost a serialization race
    /// - `Timeout` / `DatabaseError` on infrastructure failure
    async fn lock(&self, request: LockTicket) -> Result<Ticket, DomainError>;

    /// `Locked -> Unsold` and removal of the ownership record, in one transaction.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound` if the ticket does not exist
    /// - `TicketUnavailable` if the ticket is not locked (already released)
    /// - `Forbidden` if another user holds the lock
    /// - `CheckoutInProgress` if the user has an open checkout session
    /// - `VersionMismatch` / `Conflict` on concurrent modification
    async fn unlock(&self, request: UnlockTicket) -> Result<Ticket, DomainError>;

    /// Releases up to `limit` locks whose deadline passed before `now` and
    /// whose owner has no checkout session.
    ///
    /// Each ticket is released in its own transaction; a failure on one ticket
    /// is recorded in the sweep and does not stop the others.
    async fn unlock_all_expired(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<ExpiredLockSweep, DomainError>;
}

/// Input for bulk ticket creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTickets {
    pub schedule_id: ScheduleId,
    pub seat_ids: Vec<SeatId>,
    /// Frozen onto every new ticket.
    pub price: Money,
    pub now: Timestamp,
}

/// Input for a lock attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTicket {
    pub ticket_id: TicketId,
    pub user_id: UserId,
    /// Version the caller last saw; `None` accepts whatever is current.
    pub expected_version: Option<i64>,
    pub now: Timestamp,
    pub expires_at: Timestamp,
}

/// Input for an unlock attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockTicket {
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub expected_version: Option<i64>,
    pub now: Timestamp,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiredLockSweep {
    pub released: Vec<TicketId>,
    /// Tickets whose release failed; retried on the next sweep.
    pub failed: Vec<(TicketId, String)>,
}

impl ExpiredLockSweep {
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.failed.is_empty()
    }
}
