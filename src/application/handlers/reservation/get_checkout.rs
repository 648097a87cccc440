//! GetCheckoutHandler - Query handler for the caller's basket.

use std::sync::Arc;

use crate::domain::checkout::{build_line_items, total, CheckoutSession, LineItem, LockedTicket};
use crate::domain::foundation::{Money, UserId};
use crate::domain::reservation::ReservationError;
use crate::ports::{CheckoutSessionRepository, TicketReader};

#[derive(Debug, Clone)]
pub struct GetCheckoutQuery {
    pub user_id: UserId,
}

/// What the caller would pay for right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutView {
    pub tickets: Vec<LockedTicket>,
    pub line_items: Vec<LineItem>,
    pub total: Money,
    /// The open payment attempt, if any.
    pub session: Option<CheckoutSession>,
}

pub struct GetCheckoutHandler {
    reader: Arc<dyn TicketReader>,
    sessions: Arc<dyn CheckoutSessionRepository>,
}

impl GetCheckoutHandler {
    pub fn new(
        reader: Arc<dyn TicketReader>,
        sessions: Arc<dyn CheckoutSessionRepository>,
    ) -> Self {
        Self { reader, sessions }
    }

    pub async fn handle(&self, query: GetCheckoutQuery) -> Result<CheckoutView, ReservationError> {
        let mut tickets = self.reader.find_locked_by_user(&query.user_id).await?;
        tickets.sort_by_key(|t| (t.starts_at, t.seat_row, t.seat_number));
        let line_items = build_line_items(&tickets);
        let session = self.sessions.find_by_user(&query.user_id).await?;

        Ok(CheckoutView {
            total: total(&line_items),
            tickets,
            line_items,
            session,
        })
    }
}
