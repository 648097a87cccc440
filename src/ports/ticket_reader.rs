//! Ticket reader port (read side).
//!
//! Listing and checkout views. Nothing returned here may be used to decide a
//! transition; the write port re-reads inside its own transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::checkout::LockedTicket;
use crate::domain::foundation::{DomainError, ScheduleId, SeatId, UserId};
use crate::domain::ticket::Ticket;

#[async_trait]
pub trait TicketReader: Send + Sync {
    /// All tickets of a schedule with their seat position, ordered by row then seat.
    async fn list_for_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<TicketSeat>, DomainError>;

    /// Tickets currently locked by the user, with the catalog context needed
    /// to price and label them.
    async fn find_locked_by_user(&self, user_id: &UserId)
        -> Result<Vec<LockedTicket>, DomainError>;
}

/// A ticket and where its seat is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSeat {
    pub ticket: Ticket,
    pub seat_id: SeatId,
    pub row: i32,
    pub number: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_reader_is_object_safe() {
        fn _accepts_dyn(_reader: &dyn TicketReader) {}
    }
}
