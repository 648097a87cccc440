//! Lock expiry reconciler: reverts locks that outlived their window.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{Clock, TicketRepository};

use super::reconciler::{Reconciler, SweepReport};

/// Releases expired locks of users with no open checkout, up to `batch_size`
/// per tick. Each ticket is released in its own transaction.
pub struct LockExpiryReconciler {
    tickets: Arc<dyn TicketRepository>,
    clock: Arc<dyn Clock>,
    batch_size: u32,
}

impl LockExpiryReconciler {
    pub fn new(tickets: Arc<dyn TicketRepository>, clock: Arc<dyn Clock>, batch_size: u32) -> Self {
        Self {
            tickets,
            clock,
            batch_size,
        }
    }
}

#[async_trait]
impl Reconciler for LockExpiryReconciler {
    fn name(&self) -> &'static str {
        "lock_expiry"
    }

    async fn sweep(&self) -> Result<SweepReport, DomainError> {
        let sweep = self
            .tickets
            .unlock_all_expired(self.clock.now(), self.batch_size)
            .await?;

        for ticket_id in &sweep.released {
            tracing::info!(%ticket_id, "Expired lock released");
        }
        for (ticket_id, reason) in &sweep.failed {
            tracing::warn!(%ticket_id, error = %reason, "Expired lock not released");
        }

        Ok(SweepReport {
            processed: sweep.released.len(),
            failed: sweep.failed.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryStore, ManualClock};
    use crate::domain::foundation::{Money, Timestamp, UserId};
    use crate::domain::ticket::TicketState;
    use crate::ports::{CreateTickets, LockTicket};

    #[tokio::test]
    async fn releases_only_expired_locks() {
        let start = Timestamp::now();
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start));

        let cinema = store.add_cinema(UserId::new("owner").unwrap(), "Odeon");
        let hall = store.add_hall(cinema, "Hall 1", Money::ZERO);
        let seats = store.add_seats(hall, 1, 2);
        let movie = store.add_movie("Alien");
        let schedule = store.add_schedule(hall, movie, start.plus_secs(7200), Money::from_cents(900).unwrap());
        store
            .create_all_for_schedule(CreateTickets {
                schedule_id: schedule,
                seat_ids: seats,
                price: Money::from_cents(900).unwrap(),
                now: start,
            })
            .await
            .unwrap();
        let tickets = store.tickets_for(schedule);

        for (ticket, window) in tickets.iter().zip([60, 600]) {
            store
                .lock(LockTicket {
                    ticket_id: ticket.id(),
                    user_id: UserId::new("alice").unwrap(),
                    expected_version: None,
                    now: start,
                    expires_at: start.plus_secs(window),
                })
                .await
                .unwrap();
        }

        clock.advance_secs(120);
        let reconciler = LockExpiryReconciler::new(store.clone(), clock.clone(), 100);
        let report = reconciler.sweep().await.unwrap();

        assert_eq!(report, SweepReport { processed: 1, failed: 0 });
        let states: Vec<_> = store.tickets_for(schedule).iter().map(|t| t.state()).collect();
        assert!(states.contains(&TicketState::Unsold));
        assert!(states.contains(&TicketState::Locked));
    }

    #[tokio::test]
    async fn lock_is_released_on_a_tick_exactly_at_its_deadline() {
        let start = Timestamp::now();
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start));

        let cinema = store.add_cinema(UserId::new("owner").unwrap(), "Odeon");
        let hall = store.add_hall(cinema, "Hall 1", Money::ZERO);
        let seats = store.add_seats(hall, 1, 1);
        let movie = store.add_movie("Alien");
        let schedule = store.add_schedule(hall, movie, start.plus_secs(7200), Money::from_cents(900).unwrap());
        store
            .create_all_for_schedule(CreateTickets {
                schedule_id: schedule,
                seat_ids: seats,
                price: Money::from_cents(900).unwrap(),
                now: start,
            })
            .await
            .unwrap();
        let ticket = store.tickets_for(schedule)[0].clone();
        store
            .lock(LockTicket {
                ticket_id: ticket.id(),
                user_id: UserId::new("alice").unwrap(),
                expected_version: None,
                now: start,
                expires_at: start.plus_secs(600),
            })
            .await
            .unwrap();
        let reconciler = LockExpiryReconciler::new(store.clone(), clock.clone(), 100);

        clock.advance_secs(599);
        assert_eq!(reconciler.sweep().await.unwrap().processed, 0);

        clock.advance_secs(1);
        let report = reconciler.sweep().await.unwrap();

        assert_eq!(report, SweepReport { processed: 1, failed: 0 });
        assert_eq!(store.tickets_for(schedule)[0].state(), TicketState::Unsold);
        assert_eq!(store.lock_count(), 0);
    }
}
