//! A user's single in-flight payment attempt.

use crate::domain::foundation::{PaymentSessionId, TicketId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local record of an open gateway session.
///
/// While it exists the user's lock set is frozen: no new locks, no unlocks,
/// no second checkout. `ticket_ids` is the set that was priced for the
/// provider and the only set a payment can sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub user_id: UserId,
    pub session_id: PaymentSessionId,
    pub checkout_url: Option<String>,
    pub ticket_ids: Vec<TicketId>,
    pub created_at: Timestamp,
    /// Set while an asynchronous payment result is outstanding; the session
    /// is not reconciled again before this instant.
    pub next_check_at: Option<Timestamp>,
}

impl CheckoutSession {
    pub fn new(
        user_id: UserId,
        session_id: PaymentSessionId,
        checkout_url: Option<String>,
        mut ticket_ids: Vec<TicketId>,
        created_at: Timestamp,
    ) -> Self {
        ticket_ids.sort();
        ticket_ids.dedup();
        Self {
            user_id,
            session_id,
            checkout_url,
            ticket_ids,
            created_at,
            next_check_at: None,
        }
    }

    /// Whether `locked` is exactly the priced set.
    pub fn covers_exactly(&self, locked: &[TicketId]) -> bool {
        let mut locked = locked.to_vec();
        locked.sort();
        locked.dedup();
        locked == self.ticket_ids
    }

    /// Whether the reconciler may look at this session at `now`.
    pub fn is_due_at(&self, now: Timestamp) -> bool {
        self.next_check_at.map_or(true, |at| !now.is_before(&at))
    }

    /// The instant that orders due sessions: deferred ones by their recheck
    /// time, the rest by creation.
    pub fn due_since(&self) -> Timestamp {
        self.next_check_at.unwrap_or(self.created_at)
    }

    pub fn expires_at(&self, window: Duration) -> Timestamp {
        self.created_at.plus_std(window)
    }

    pub fn is_expired_at(&self, now: Timestamp, window: Duration) -> bool {
        now.is_after(&self.expires_at(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_derived_from_creation() {
        let created = Timestamp::now();
        let session = CheckoutSession::new(
            UserId::new("u").unwrap(),
            PaymentSessionId::new("cs_1").unwrap(),
            None,
            Vec::new(),
            created,
        );
        let window = Duration::from_secs(1800);

        assert_eq!(session.expires_at(window), created.plus_secs(1800));
        assert!(!session.is_expired_at(created.plus_secs(1800), window));
        assert!(session.is_expired_at(created.plus_secs(1801), window));
    }

    #[test]
    fn priced_set_ignores_order_and_duplicates() {
        let (a, b) = (TicketId::new(), TicketId::new());
        let session = CheckoutSession::new(
            UserId::new("u").unwrap(),
            PaymentSessionId::new("cs_1").unwrap(),
            None,
            vec![b, a, b],
            Timestamp::now(),
        );

        assert_eq!(session.ticket_ids.len(), 2);
        assert!(session.covers_exactly(&[a, b]));
        assert!(!session.covers_exactly(&[a]));
        assert!(!session.covers_exactly(&[a, b, TicketId::new()]));
    }

    #[test]
    fn deferred_session_is_due_from_its_recheck_time() {
        let created = Timestamp::now();
        let mut session = CheckoutSession::new(
            UserId::new("u").unwrap(),
            PaymentSessionId::new("cs_1").unwrap(),
            None,
            Vec::new(),
            created,
        );
        assert!(session.is_due_at(created));
        assert_eq!(session.due_since(), created);

        session.next_check_at = Some(created.plus_secs(600));

        assert!(!session.is_due_at(created.plus_secs(599)));
        assert!(session.is_due_at(created.plus_secs(600)));
        assert_eq!(session.due_since(), created.plus_secs(600));
    }
}
