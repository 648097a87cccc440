//! Ownership record binding a locked ticket to one user.

use crate::domain::foundation::{TicketId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Exists exactly while its ticket is `Locked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLock {
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub expires_at: Timestamp,
}

impl TicketLock {
    pub fn new(ticket_id: TicketId, user_id: UserId, expires_at: Timestamp) -> Self {
        Self {
            ticket_id,
            user_id,
            expires_at,
        }
    }

    pub fn is_held_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// A lock is expired from its deadline onwards.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }
}
