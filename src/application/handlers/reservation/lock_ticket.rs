//! LockTicketHandler - Command handler for holding a seat.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{AuthenticatedUser, TicketId, Timestamp};
use crate::domain::reservation::ReservationError;
use crate::domain::ticket::Ticket;
use crate::ports::{Clock, LockTicket, TicketRepository};

use super::access::{ensure_activated, validate_version};

/// Command to lock a ticket for the caller.
#[derive(Debug, Clone)]
pub struct LockTicketCommand {
    pub ticket_id: TicketId,
    pub user: AuthenticatedUser,
    /// Version the caller last saw; `None` accepts whatever is current.
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTicketResult {
    pub ticket: Ticket,
    /// When the lock reconciler may release the hold.
    pub expires_at: Timestamp,
}

/// Handler for locking tickets.
///
/// The state change and the ownership record commit together or not at all;
/// of two racing callers exactly one succeeds.
pub struct LockTicketHandler {
    tickets: Arc<dyn TicketRepository>,
    clock: Arc<dyn Clock>,
    lock_window: Duration,
}

impl LockTicketHandler {
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        clock: Arc<dyn Clock>,
        lock_window: Duration,
    ) -> Self {
        Self {
            tickets,
            clock,
            lock_window,
        }
    }

    pub async fn handle(&self, cmd: LockTicketCommand) -> Result<LockTicketResult, ReservationError> {
        ensure_activated(&cmd.user)?;
        validate_version(cmd.expected_version)?;

        let now = self.clock.now();
        let expires_at = now.plus_std(self.lock_window);

        let ticket = self
            .tickets
            .lock(LockTicket {
                ticket_id: cmd.ticket_id,
                user_id: cmd.user.id.clone(),
                expected_version: cmd.expected_version,
                now,
                expires_at,
            })
            .await
            .map_err(|e| {
                tracing::debug!(ticket_id = %cmd.ticket_id, user_id = %cmd.user.id, error = %e, "Lock refused");
                ReservationError::from(e)
            })?;

        tracing::info!(
            ticket_id = %ticket.id(),
            user_id = %cmd.user.id,
            version = ticket.version(),
            "Ticket locked"
        );

        Ok(LockTicketResult { ticket, expires_at })
    }
}
