//! GenerateTicketsHandler - Command handler for creating a schedule's tickets.

use std::sync::Arc;

use crate::domain::foundation::{AuthenticatedUser, Money, ScheduleId};
use crate::domain::reservation::ReservationError;
use crate::ports::{CatalogReader, Clock, CreateTickets, TicketRepository};

/// Command to create one ticket per seat of the schedule's hall.
#[derive(Debug, Clone)]
pub struct GenerateTicketsCommand {
    pub schedule_id: ScheduleId,
    pub operator: AuthenticatedUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateTicketsResult {
    /// Tickets created by this call; seats that already had one are skipped.
    pub created: u64,
    pub price: Money,
}

/// Handler for bulk ticket creation.
///
/// Only the owner of the cinema the schedule plays in may generate tickets.
pub struct GenerateTicketsHandler {
    catalog: Arc<dyn CatalogReader>,
    tickets: Arc<dyn TicketRepository>,
    clock: Arc<dyn Clock>,
}

impl GenerateTicketsHandler {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        tickets: Arc<dyn TicketRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            tickets,
            clock,
        }
    }

    pub async fn handle(
        &self,
        cmd: GenerateTicketsCommand,
    ) -> Result<GenerateTicketsResult, ReservationError> {
        let schedule = self
            .catalog
            .get_schedule(cmd.schedule_id)
            .await?
            .ok_or(ReservationError::ScheduleNotFound(cmd.schedule_id))?;

        let hall = self.catalog.get_hall(schedule.hall_id).await?.ok_or_else(|| {
            ReservationError::infrastructure(format!(
                "Hall {} of schedule {} is missing",
                schedule.hall_id, schedule.id
            ))
        })?;

        if hall.owner_id != cmd.operator.id {
            tracing::warn!(
                schedule_id = %schedule.id,
                user_id = %cmd.operator.id,
                "Ticket generation refused for non-owner"
            );
            return Err(ReservationError::forbidden(
                "Only the cinema owner can generate tickets",
            ));
        }

        let seat_ids = self
            .catalog
            .seats_for_hall(hall.id)
            .await?
            .into_iter()
            .map(|seat| seat.id)
            .collect();
        let price = hall.ticket_price(&schedule);

        let created = self
            .tickets
            .create_all_for_schedule(CreateTickets {
                schedule_id: schedule.id,
                seat_ids,
                price,
                now: self.clock.now(),
            })
            .await?;

        tracing::info!(
            schedule_id = %schedule.id,
            created,
            price = %price,
            "Generated tickets"
        );

        Ok(GenerateTicketsResult { created, price })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::reservation::test_support::{user, Fixture, OWNER};

    fn handler(f: &Fixture) -> GenerateTicketsHandler {
        GenerateTicketsHandler::new(f.store.clone(), f.store.clone(), f.clock())
    }

    #[tokio::test]
    async fn owner_generates_one_ticket_per_seat() {
        let f = Fixture::new();

        let result = handler(&f)
            .handle(GenerateTicketsCommand {
                schedule_id: f.schedule_id,
                operator: user(OWNER),
            })
            .await
            .unwrap();

        assert_eq!(result.created, 6);
        // schedule price plus hall surcharge
        assert_eq!(result.price.cents(), 1200);
        assert!(f
            .store
            .tickets_for(f.schedule_id)
            .iter()
            .all(|t| t.price().cents() == 1200 && t.version() == 0));
    }

    #[tokio::test]
    async fn second_generation_creates_nothing() {
        let f = Fixture::new();
        let cmd = GenerateTicketsCommand {
            schedule_id: f.schedule_id,
            operator: user(OWNER),
        };

        handler(&f).handle(cmd.clone()).await.unwrap();
        let again = handler(&f).handle(cmd).await.unwrap();

        assert_eq!(again.created, 0);
        assert_eq!(f.store.tickets_for(f.schedule_id).len(), 6);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let f = Fixture::new();

        let err = handler(&f)
            .handle(GenerateTicketsCommand {
                schedule_id: f.schedule_id,
                operator: user("mallory"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::Forbidden(_)));
        assert!(f.store.tickets_for(f.schedule_id).is_empty());
    }

    #[tokio::test]
    async fn unknown_schedule_is_not_found() {
        let f = Fixture::new();
        let missing = ScheduleId::new();

        let err = handler(&f)
            .handle(GenerateTicketsCommand {
                schedule_id: missing,
                operator: user(OWNER),
            })
            .await
            .unwrap_err();

        assert_eq!(err, ReservationError::ScheduleNotFound(missing));
    }
}
