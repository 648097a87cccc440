//! Shared fixture for handler tests.

use std::sync::Arc;

use crate::adapters::memory::{InMemoryStore, ManualClock};
use crate::adapters::stripe::MockPaymentGateway;
use crate::domain::foundation::{
    AuthenticatedUser, Money, ScheduleId, TicketId, Timestamp, UserId,
};
use crate::ports::{CatalogReader, Clock, CreateTickets, TicketRepository};

pub(crate) const OWNER: &str = "owner-1";

pub(crate) struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<MockPaymentGateway>,
    pub clock: Arc<ManualClock>,
    pub schedule_id: ScheduleId,
    pub start: Timestamp,
}

impl Fixture {
    /// One cinema with a 2x3 hall and a showing one hour from now.
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let start = Timestamp::now();
        let cinema = store.add_cinema(UserId::new(OWNER).unwrap(), "Odeon");
        let hall = store.add_hall(cinema, "Hall 1", Money::from_cents(200).unwrap());
        store.add_seats(hall, 2, 3);
        let movie = store.add_movie("Alien");
        let schedule_id = store.add_schedule(
            hall,
            movie,
            start.plus_secs(3600),
            Money::from_cents(1000).unwrap(),
        );

        Self {
            store,
            gateway: Arc::new(MockPaymentGateway::new()),
            clock: Arc::new(ManualClock::new(start)),
            schedule_id,
            start,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Generates the schedule's tickets and returns their ids.
    pub async fn with_tickets(self) -> (Self, Vec<TicketId>) {
        let schedule = self.store.get_schedule(self.schedule_id).await.unwrap().unwrap();
        let seat_ids = self
            .store
            .seats_for_hall(schedule.hall_id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        self.store
            .create_all_for_schedule(CreateTickets {
                schedule_id: self.schedule_id,
                seat_ids,
                price: Money::from_cents(1200).unwrap(),
                now: self.start,
            })
            .await
            .unwrap();
        let ids = self
            .store
            .tickets_for(self.schedule_id)
            .into_iter()
            .map(|t| t.id())
            .collect();
        (self, ids)
    }
}

pub(crate) fn user(id: &str) -> AuthenticatedUser {
    AuthenticatedUser::new(
        UserId::new(id).unwrap(),
        format!("{}@example.test", id),
        None,
        true,
    )
}

pub(crate) fn inactive_user(id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        activated: false,
        ..user(id)
    }
}
