//! Priced line items built from a user's locked tickets.

use crate::domain::foundation::{Money, TicketId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::domain::ticket::Ticket;

/// A locked ticket joined with the catalog context shown at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedTicket {
    pub ticket: Ticket,
    pub lock_expires_at: Timestamp,
    pub movie_title: String,
    pub cinema_name: String,
    pub hall_name: String,
    pub seat_row: i32,
    pub seat_number: i32,
    pub starts_at: Timestamp,
}

impl LockedTicket {
    /// Human readable label, e.g. "Alien - Odeon, Hall 2, Row 4 Seat 7".
    pub fn label(&self) -> String {
        format!(
            "{} - {}, {}, Row {} Seat {}",
            self.movie_title, self.cinema_name, self.hall_name, self.seat_row, self.seat_number
        )
    }
}

/// One entry of the amount charged by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub ticket_id: TicketId,
    pub name: String,
    pub description: String,
    pub unit_amount: Money,
    pub quantity: u32,
}

impl From<&LockedTicket> for LineItem {
    fn from(locked: &LockedTicket) -> Self {
        Self {
            ticket_id: locked.ticket.id(),
            name: locked.label(),
            description: format!("Showing at {}", locked.starts_at.as_datetime().to_rfc3339()),
            unit_amount: locked.ticket.price(),
            quantity: 1,
        }
    }
}

/// Builds the line items for a checkout, one per ticket, ordered by seat.
pub fn build_line_items(locked: &[LockedTicket]) -> Vec<LineItem> {
    let mut sorted: Vec<&LockedTicket> = locked.iter().collect();
    sorted.sort_by_key(|t| (t.starts_at, t.seat_row, t.seat_number));
    sorted.into_iter().map(LineItem::from).collect()
}

/// Total charged for the given items.
pub fn total(items: &[LineItem]) -> Money {
    items
        .iter()
        .map(|item| {
            let cents = item.unit_amount.cents().saturating_mul(i64::from(item.quantity));
            Money::from_cents(cents).unwrap_or(Money::ZERO)
        })
        .sum()
}
