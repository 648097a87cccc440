//! Ticket entity.

use crate::domain::foundation::{
    DomainError, ErrorCode, Money, ScheduleId, SeatId, StateMachine, TicketId, Timestamp,
};
use serde::{Deserialize, Serialize};

use super::TicketState;

/// One seat's eligibility to attend one schedule.
///
/// `schedule_id`, `seat_id` and `price` never change after creation. Every
/// state change bumps `version` by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    schedule_id: ScheduleId,
    seat_id: SeatId,
    price: Money,
    state: TicketState,
    state_changed_at: Timestamp,
    version: i64,
}

impl Ticket {
    /// Creates a fresh, unsold ticket at version 0.
    pub fn new(schedule_id: ScheduleId, seat_id: SeatId, price: Money, now: Timestamp) -> Self {
        Self {
            id: TicketId::new(),
            schedule_id,
            seat_id,
            price,
            state: TicketState::Unsold,
            state_changed_at: now,
            version: 0,
        }
    }

    /// Rebuilds a ticket from persisted fields.
    pub fn reconstitute(
        id: TicketId,
        schedule_id: ScheduleId,
        seat_id: SeatId,
        price: Money,
        state: TicketState,
        state_changed_at: Timestamp,
        version: i64,
    ) -> Self {
        Self {
            id,
            schedule_id,
            seat_id,
            price,
            state,
            state_changed_at,
            version,
        }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn schedule_id(&self) -> ScheduleId {
        self.schedule_id
    }

    pub fn seat_id(&self) -> SeatId {
        self.seat_id
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn state(&self) -> TicketState {
        self.state
    }

    pub fn state_changed_at(&self) -> Timestamp {
        self.state_changed_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Checks that the caller's view of the ticket is still current.
    pub fn check_version(&self, expected: i64) -> Result<(), DomainError> {
        if self.version != expected {
            return Err(DomainError::new(
                ErrorCode::VersionMismatch,
                "Ticket was modified concurrently; re-read and retry",
            )
            .with_detail("ticket_id", self.id.to_string())
            .with_detail("expected_version", expected.to_string())
            .with_detail("current_version", self.version.to_string()));
        }
        Ok(())
    }

    /// Returns the ticket after moving to `target`.
    ///
    /// Illegal moves (anything out of `Sold`, locking a locked ticket, ...)
    /// fail with `TicketUnavailable` and leave `self` untouched.
    pub fn transitioned(&self, target: TicketState, now: Timestamp) -> Result<Ticket, DomainError> {
        let state = self.state.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::TicketUnavailable,
                format!("Ticket is {} and cannot become {}", self.state, target),
            )
            .with_detail("ticket_id", self.id.to_string())
            .with_detail("state", self.state.to_string())
        })?;

        Ok(Ticket {
            state,
            state_changed_at: now,
            version: self.version + 1,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        Ticket::new(
            ScheduleId::new(),
            SeatId::new(),
            Money::from_cents(1200).unwrap(),
            Timestamp::now(),
        )
    }

    #[test]
    fn new_ticket_is_unsold_at_version_zero() {
        let t = ticket();
        assert_eq!(t.state(), TicketState::Unsold);
        assert_eq!(t.version(), 0);
    }

    #[test]
    fn transition_bumps_version_and_timestamp() {
        let t = ticket();
        let later = t.state_changed_at().plus_secs(30);
        let locked = t.transitioned(TicketState::Locked, later).unwrap();

        assert_eq!(locked.state(), TicketState::Locked);
        assert_eq!(locked.version(), 1);
        assert_eq!(locked.state_changed_at(), later);
        assert_eq!(locked.price(), t.price());
        assert_eq!(locked.id(), t.id());
    }

    #[test]
    fn locking_a_locked_ticket_is_unavailable() {
        let locked = ticket()
            .transitioned(TicketState::Locked, Timestamp::now())
            .unwrap();
        let err = locked
            .transitioned(TicketState::Locked, Timestamp::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TicketUnavailable);
        assert_eq!(err.details.get("state"), Some(&"locked".to_string()));
    }

    #[test]
    fn sold_ticket_cannot_move() {
        let now = Timestamp::now();
        let sold = ticket()
            .transitioned(TicketState::Locked, now)
            .and_then(|t| t.transitioned(TicketState::Sold, now))
            .unwrap();
        assert_eq!(sold.version(), 2);
        assert!(sold.transitioned(TicketState::Locked, now).is_err());
        assert!(sold.transitioned(TicketState::Unsold, now).is_err());
    }

    #[test]
    fn stale_version_is_rejected() {
        let t = ticket();
        assert!(t.check_version(0).is_ok());
        let err = t.check_version(3).unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionMismatch);
        assert!(err.code.is_conflict());
    }
}
