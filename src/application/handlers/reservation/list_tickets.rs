//! ListTicketsHandler - Query handler for a schedule's seat map.

use std::sync::Arc;

use crate::domain::foundation::ScheduleId;
use crate::domain::reservation::ReservationError;
use crate::ports::{CatalogReader, TicketReader, TicketSeat};

#[derive(Debug, Clone)]
pub struct ListTicketsQuery {
    pub schedule_id: ScheduleId,
}

/// Tickets ordered by row, then seat number.
pub type ListTicketsResult = Vec<TicketSeat>;

/// Public listing; no caller required.
pub struct ListTicketsHandler {
    catalog: Arc<dyn CatalogReader>,
    reader: Arc<dyn TicketReader>,
}

impl ListTicketsHandler {
    pub fn new(catalog: Arc<dyn CatalogReader>, reader: Arc<dyn TicketReader>) -> Self {
        Self { catalog, reader }
    }

    pub async fn handle(&self, query: ListTicketsQuery) -> Result<ListTicketsResult, ReservationError> {
        if self.catalog.get_schedule(query.schedule_id).await?.is_none() {
            return Err(ReservationError::ScheduleNotFound(query.schedule_id));
        }
        Ok(self.reader.list_for_schedule(query.schedule_id).await?)
    }
}
