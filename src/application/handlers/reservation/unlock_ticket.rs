//! UnlockTicketHandler - Command handler for releasing a held seat.

use std::sync::Arc;

use crate::domain::foundation::{AuthenticatedUser, TicketId};
use crate::domain::reservation::ReservationError;
use crate::domain::ticket::Ticket;
use crate::ports::{Clock, TicketRepository, UnlockTicket};

use super::access::{ensure_activated, validate_version};

/// Command to release a ticket the caller holds.
#[derive(Debug, Clone)]
pub struct UnlockTicketCommand {
    pub ticket_id: TicketId,
    pub user: AuthenticatedUser,
    pub expected_version: Option<i64>,
}

/// Handler for unlocking tickets.
///
/// Only the lock holder may unlock, and not while their checkout is open.
pub struct UnlockTicketHandler {
    tickets: Arc<dyn TicketRepository>,
    clock: Arc<dyn Clock>,
}

impl UnlockTicketHandler {
    pub fn new(tickets: Arc<dyn TicketRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { tickets, clock }
    }

    pub async fn handle(&self, cmd: UnlockTicketCommand) -> Result<Ticket, ReservationError> {
        ensure_activated(&cmd.user)?;
        validate_version(cmd.expected_version)?;

        let ticket = self
            .tickets
            .unlock(UnlockTicket {
                ticket_id: cmd.ticket_id,
                user_id: cmd.user.id.clone(),
                expected_version: cmd.expected_version,
                now: self.clock.now(),
            })
            .await?;

        tracing::info!(
            ticket_id = %ticket.id(),
            user_id = %cmd.user.id,
            version = ticket.version(),
            "Ticket unlocked"
        );

        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::reservation::lock_ticket::{
        LockTicketCommand, LockTicketHandler,
    };
    use crate::application::handlers::reservation::test_support::{user, Fixture};
    use crate::domain::foundation::ErrorCode;
    use crate::domain::ticket::TicketState;
    use std::time::Duration;

    async fn locked(f: &Fixture, ticket_id: TicketId, who: &str) -> Ticket {
        LockTicketHandler::new(f.store.clone(), f.clock(), Duration::from_secs(900))
            .handle(LockTicketCommand {
                ticket_id,
                user: user(who),
                expected_version: None,
            })
            .await
            .unwrap()
            .ticket
    }

    fn cmd(ticket_id: TicketId, who: &str, version: Option<i64>) -> UnlockTicketCommand {
        UnlockTicketCommand {
            ticket_id,
            user: user(who),
            expected_version: version,
        }
    }

    #[tokio::test]
    async fn round_trip_bumps_version_and_clears_lock() {
        let (f, ids) = Fixture::new().with_tickets().await;
        let held = locked(&f, ids[0], "alice").await;
        let handler = UnlockTicketHandler::new(f.store.clone(), f.clock());

        let ticket = handler
            .handle(cmd(ids[0], "alice", Some(held.version())))
            .await
            .unwrap();

        assert_eq!(ticket.state(), TicketState::Unsold);
        assert!(ticket.version() > held.version());
        assert!(f.store.lock_for(ids[0]).is_none());
    }

    #[tokio::test]
    async fn only_holder_may_unlock() {
        let (f, ids) = Fixture::new().with_tickets().await;
        locked(&f, ids[0], "alice").await;
        let handler = UnlockTicketHandler::new(f.store.clone(), f.clock());

        let err = handler.handle(cmd(ids[0], "bob", None)).await.unwrap_err();

        assert!(matches!(err, ReservationError::Forbidden(_)));
        assert!(f.store.lock_for(ids[0]).is_some());
    }

    #[tokio::test]
    async fn unlocking_unsold_ticket_conflicts() {
        let (f, ids) = Fixture::new().with_tickets().await;
        let handler = UnlockTicketHandler::new(f.store.clone(), f.clock());

        let err = handler.handle(cmd(ids[0], "alice", None)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::TicketUnavailable);
    }

    #[tokio::test]
    async fn stale_version_keeps_lock() {
        let (f, ids) = Fixture::new().with_tickets().await;
        locked(&f, ids[0], "alice").await;
        let handler = UnlockTicketHandler::new(f.store.clone(), f.clock());

        let err = handler.handle(cmd(ids[0], "alice", Some(0))).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::VersionMismatch);
        assert!(f.store.lock_for(ids[0]).is_some());
    }
}
