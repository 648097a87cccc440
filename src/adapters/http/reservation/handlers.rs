//! HTTP handlers for reservation endpoints.
//!
//! These handlers connect axum routes to the application layer command and
//! query handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::{
    BeginCheckoutCommand, BeginCheckoutHandler, CancelCheckoutCommand, CancelCheckoutHandler,
    CheckoutSettings, GenerateTicketsCommand, GenerateTicketsHandler, GetCheckoutHandler,
    GetCheckoutQuery, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    ListTicketsHandler, ListTicketsQuery, LockTicketCommand, LockTicketHandler,
    ReconcileCheckoutHandler, UnlockTicketCommand, UnlockTicketHandler,
};
use crate::domain::foundation::{PaymentSessionId, ScheduleId, TicketId};
use crate::domain::reservation::ReservationError;
use crate::ports::{
    CatalogReader, CheckoutSessionRepository, Clock, PaymentGateway, TicketReader,
    TicketRepository,
};

use super::super::error::ApiError;
use super::super::middleware::RequireAuth;
use super::dto::{
    BeginCheckoutResponse, CancelCheckoutParams, CancelCheckoutResponse, CheckoutViewResponse,
    GenerateTicketsResponse, LockResponse, TicketListResponse, TicketResponse,
    TicketSeatResponse, TicketVersionRequest, WebhookResponse,
};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state; handlers are built on demand from the ports.
#[derive(Clone)]
pub struct ReservationAppState {
    pub tickets: Arc<dyn TicketRepository>,
    pub reader: Arc<dyn TicketReader>,
    pub sessions: Arc<dyn CheckoutSessionRepository>,
    pub catalog: Arc<dyn CatalogReader>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub clock: Arc<dyn Clock>,
    pub checkout: CheckoutSettings,
    pub lock_window: Duration,
}

impl ReservationAppState {
    pub fn generate_tickets_handler(&self) -> GenerateTicketsHandler {
        GenerateTicketsHandler::new(self.catalog.clone(), self.tickets.clone(), self.clock.clone())
    }

    pub fn list_tickets_handler(&self) -> ListTicketsHandler {
        ListTicketsHandler::new(self.catalog.clone(), self.reader.clone())
    }

    pub fn lock_ticket_handler(&self) -> LockTicketHandler {
        LockTicketHandler::new(self.tickets.clone(), self.clock.clone(), self.lock_window)
    }

    pub fn unlock_ticket_handler(&self) -> UnlockTicketHandler {
        UnlockTicketHandler::new(self.tickets.clone(), self.clock.clone())
    }

    pub fn get_checkout_handler(&self) -> GetCheckoutHandler {
        GetCheckoutHandler::new(self.reader.clone(), self.sessions.clone())
    }

    pub fn begin_checkout_handler(&self) -> BeginCheckoutHandler {
        BeginCheckoutHandler::new(
            self.reader.clone(),
            self.sessions.clone(),
            self.gateway.clone(),
            self.clock.clone(),
            self.checkout.clone(),
        )
    }

    pub fn reconcile_checkout_handler(&self) -> ReconcileCheckoutHandler {
        ReconcileCheckoutHandler::new(
            self.gateway.clone(),
            self.sessions.clone(),
            self.clock.clone(),
        )
    }

    pub fn cancel_checkout_handler(&self) -> CancelCheckoutHandler {
        CancelCheckoutHandler::new(
            self.sessions.clone(),
            Arc::new(self.reconcile_checkout_handler()),
        )
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.gateway.clone(),
            self.sessions.clone(),
            self.clock.clone(),
        )
    }
}

fn parse_schedule_id(raw: &str) -> Result<ScheduleId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(ReservationError::validation("schedule_id", "must be a UUID")))
}

fn parse_ticket_id(raw: &str) -> Result<TicketId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(ReservationError::validation("ticket_id", "must be a UUID")))
}

// ════════════════════════════════════════════════════════════════════════════════
// Tickets
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/schedules/{id}/tickets - Generate a schedule's tickets (cinema owner)
pub async fn generate_tickets(
    State(state): State<ReservationAppState>,
    RequireAuth(user): RequireAuth,
    Path(schedule_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = GenerateTicketsCommand {
        schedule_id: parse_schedule_id(&schedule_id)?,
        operator: user,
    };
    let result = state.generate_tickets_handler().handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(GenerateTicketsResponse::from(result))))
}

/// GET /api/schedules/{id}/tickets - List a schedule's tickets
pub async fn list_tickets(
    State(state): State<ReservationAppState>,
    Path(schedule_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let query = ListTicketsQuery {
        schedule_id: parse_schedule_id(&schedule_id)?,
    };
    let seats = state.list_tickets_handler().handle(query).await?;
    Ok(Json(TicketListResponse {
        tickets: seats.iter().map(TicketSeatResponse::from).collect(),
    }))
}

/// POST /api/tickets/{id}/lock - Hold a ticket for the caller
pub async fn lock_ticket(
    State(state): State<ReservationAppState>,
    RequireAuth(user): RequireAuth,
    Path(ticket_id): Path<String>,
    body: Option<Json<TicketVersionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.unwrap_or_default();
    let cmd = LockTicketCommand {
        ticket_id: parse_ticket_id(&ticket_id)?,
        user,
        expected_version: request.version,
    };
    let result = state.lock_ticket_handler().handle(cmd).await?;
    Ok(Json(LockResponse::from(result)))
}

/// POST /api/tickets/{id}/unlock - Release a held ticket
pub async fn unlock_ticket(
    State(state): State<ReservationAppState>,
    RequireAuth(user): RequireAuth,
    Path(ticket_id): Path<String>,
    body: Option<Json<TicketVersionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.unwrap_or_default();
    let cmd = UnlockTicketCommand {
        ticket_id: parse_ticket_id(&ticket_id)?,
        user,
        expected_version: request.version,
    };
    let ticket = state.unlock_ticket_handler().handle(cmd).await?;
    Ok(Json(TicketResponse::from(&ticket)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/checkout - The caller's locked tickets and open session
pub async fn get_checkout(
    State(state): State<ReservationAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .get_checkout_handler()
        .handle(GetCheckoutQuery { user_id: user.id })
        .await?;
    Ok(Json(CheckoutViewResponse::from(&view)))
}

/// POST /api/checkout - Open a payment session for the caller's locked tickets
pub async fn begin_checkout(
    State(state): State<ReservationAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .begin_checkout_handler()
        .handle(BeginCheckoutCommand { user })
        .await?;
    Ok((StatusCode::CREATED, Json(BeginCheckoutResponse::from(result))))
}

/// GET /api/checkout/cancel?session_id= - Provider's cancel redirect
pub async fn cancel_checkout(
    State(state): State<ReservationAppState>,
    Query(params): Query<CancelCheckoutParams>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = PaymentSessionId::new(params.session_id)
        .map_err(|_| ApiError(ReservationError::validation("session_id", "must not be empty")))?;
    let result = state
        .cancel_checkout_handler()
        .handle(CancelCheckoutCommand { session_id })
        .await?;
    Ok(Json(CancelCheckoutResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/payment - Signed provider notifications
///
/// Verification failures are 400 so the provider stops retrying; processing
/// failures are 5xx so it retries.
pub async fn handle_payment_webhook(
    State(state): State<ReservationAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(ReservationError::invalid_webhook("missing signature header")))?;

    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };
    let result = state.webhook_handler().handle(cmd).await?;
    Ok(Json(WebhookResponse::from(&result)))
}
