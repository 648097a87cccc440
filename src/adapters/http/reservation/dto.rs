//! HTTP DTOs for reservation endpoints.
//!
//! Prices are integer minor units (cents); timestamps are RFC 3339.

use serde::{Deserialize, Serialize};

use crate::application::{
    BeginCheckoutResult, CancelCheckoutResult, CheckoutView, GenerateTicketsResult,
    HandlePaymentWebhookResult, LockTicketResult, ReconcileOutcome,
};
use crate::domain::checkout::{CheckoutSession, LineItem, LockedTicket};
use crate::domain::ticket::{Ticket, TicketState};
use crate::ports::TicketSeat;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of lock and unlock requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketVersionRequest {
    /// Version the client last saw; omitted means "whatever is current".
    #[serde(default)]
    pub version: Option<i64>,
}

/// Query string of the provider's cancel redirect.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelCheckoutParams {
    pub session_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketResponse {
    pub id: String,
    pub schedule_id: String,
    pub seat_id: String,
    pub state: TicketState,
    pub price: i64,
    pub version: i64,
    pub state_changed_at: String,
}

impl From<&Ticket> for TicketResponse {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id().to_string(),
            schedule_id: ticket.schedule_id().to_string(),
            seat_id: ticket.seat_id().to_string(),
            state: ticket.state(),
            price: ticket.price().cents(),
            version: ticket.version(),
            state_changed_at: ticket.state_changed_at().as_datetime().to_rfc3339(),
        }
    }
}

/// A ticket in a schedule listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSeatResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub row: i32,
    pub number: i32,
}

impl From<&TicketSeat> for TicketSeatResponse {
    fn from(seat: &TicketSeat) -> Self {
        Self {
            ticket: TicketResponse::from(&seat.ticket),
            row: seat.row,
            number: seat.number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketSeatResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateTicketsResponse {
    pub created: u64,
    pub price: i64,
}

impl From<GenerateTicketsResult> for GenerateTicketsResponse {
    fn from(result: GenerateTicketsResult) -> Self {
        Self {
            created: result.created,
            price: result.price.cents(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResponse {
    pub ticket: TicketResponse,
    pub expires_at: String,
}

impl From<LockTicketResult> for LockResponse {
    fn from(result: LockTicketResult) -> Self {
        Self {
            ticket: TicketResponse::from(&result.ticket),
            expires_at: result.expires_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedTicketResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub label: String,
    pub movie_title: String,
    pub cinema_name: String,
    pub hall_name: String,
    pub row: i32,
    pub number: i32,
    pub starts_at: String,
    pub lock_expires_at: String,
}

impl From<&LockedTicket> for LockedTicketResponse {
    fn from(locked: &LockedTicket) -> Self {
        Self {
            ticket: TicketResponse::from(&locked.ticket),
            label: locked.label(),
            movie_title: locked.movie_title.clone(),
            cinema_name: locked.cinema_name.clone(),
            hall_name: locked.hall_name.clone(),
            row: locked.seat_row,
            number: locked.seat_number,
            starts_at: locked.starts_at.as_datetime().to_rfc3339(),
            lock_expires_at: locked.lock_expires_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemResponse {
    pub ticket_id: String,
    pub name: String,
    pub description: String,
    pub unit_amount: i64,
    pub quantity: u32,
}

impl From<&LineItem> for LineItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            ticket_id: item.ticket_id.to_string(),
            name: item.name.clone(),
            description: item.description.clone(),
            unit_amount: item.unit_amount.cents(),
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: Option<String>,
    pub created_at: String,
}

impl From<&CheckoutSession> for CheckoutSessionResponse {
    fn from(session: &CheckoutSession) -> Self {
        Self {
            session_id: session.session_id.to_string(),
            url: session.checkout_url.clone(),
            created_at: session.created_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutViewResponse {
    pub tickets: Vec<LockedTicketResponse>,
    pub line_items: Vec<LineItemResponse>,
    pub total: i64,
    pub session: Option<CheckoutSessionResponse>,
}

impl From<&CheckoutView> for CheckoutViewResponse {
    fn from(view: &CheckoutView) -> Self {
        Self {
            tickets: view.tickets.iter().map(LockedTicketResponse::from).collect(),
            line_items: view.line_items.iter().map(LineItemResponse::from).collect(),
            total: view.total.cents(),
            session: view.session.as_ref().map(CheckoutSessionResponse::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginCheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
    pub expires_at: String,
    pub total: i64,
}

impl From<BeginCheckoutResult> for BeginCheckoutResponse {
    fn from(result: BeginCheckoutResult) -> Self {
        Self {
            session_id: result.session_id.to_string(),
            url: result.url,
            expires_at: result.expires_at.as_datetime().to_rfc3339(),
            total: result.total.cents(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelCheckoutResponse {
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sold: Vec<String>,
}

impl From<CancelCheckoutResult> for CancelCheckoutResponse {
    fn from(result: CancelCheckoutResult) -> Self {
        match result {
            CancelCheckoutResult::NoSession => Self {
                outcome: "no_session".into(),
                sold: vec![],
            },
            CancelCheckoutResult::Reconciled(outcome) => {
                let (name, sold) = match outcome {
                    ReconcileOutcome::Fulfilled { sold } => ("fulfilled", sold),
                    ReconcileOutcome::Expired => ("expired", vec![]),
                    ReconcileOutcome::Discarded => ("discarded", vec![]),
                    ReconcileOutcome::Pending => ("pending", vec![]),
                    ReconcileOutcome::Abandoned => ("abandoned", vec![]),
                };
                Self {
                    outcome: name.into(),
                    sold: sold.iter().map(ToString::to_string).collect(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: String,
}

impl From<&HandlePaymentWebhookResult> for WebhookResponse {
    fn from(result: &HandlePaymentWebhookResult) -> Self {
        let outcome = match result {
            HandlePaymentWebhookResult::Fulfilled { .. } => "fulfilled",
            HandlePaymentWebhookResult::SessionExpired => "session_expired",
            HandlePaymentWebhookResult::AlreadyProcessed => "already_processed",
            HandlePaymentWebhookResult::Acknowledged => "acknowledged",
            HandlePaymentWebhookResult::Ignored => "ignored",
        };
        Self {
            received: true,
            outcome: outcome.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Money, ScheduleId, SeatId, TicketId, Timestamp};

    #[test]
    fn ticket_response_uses_cents_and_snake_case_state() {
        let ticket = Ticket::new(
            ScheduleId::new(),
            SeatId::new(),
            Money::from_cents(1250).unwrap(),
            Timestamp::now(),
        );
        let json = serde_json::to_value(TicketResponse::from(&ticket)).unwrap();
        assert_eq!(json["price"], 1250);
        assert_eq!(json["state"], "unsold");
        assert_eq!(json["version"], 0);
    }

    #[test]
    fn version_is_optional_in_requests() {
        let body: TicketVersionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(body.version, None);
        let body: TicketVersionRequest = serde_json::from_str(r#"{"version": 3}"#).unwrap();
        assert_eq!(body.version, Some(3));
    }

    #[test]
    fn cancel_response_lists_sold_tickets() {
        let id = TicketId::new();
        let response = CancelCheckoutResponse::from(CancelCheckoutResult::Reconciled(
            ReconcileOutcome::Fulfilled { sold: vec![id] },
        ));
        assert_eq!(response.outcome, "fulfilled");
        assert_eq!(response.sold, vec![id.to_string()]);

        let response =
            CancelCheckoutResponse::from(CancelCheckoutResult::Reconciled(ReconcileOutcome::Abandoned));
        assert_eq!(response.outcome, "abandoned");
        assert!(response.sold.is_empty());
    }
}
