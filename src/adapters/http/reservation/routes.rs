//! Axum router configuration for reservation endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    begin_checkout, cancel_checkout, generate_tickets, get_checkout, handle_payment_webhook,
    list_tickets, lock_ticket, unlock_ticket, ReservationAppState,
};

/// Routes mounted under `/api`.
///
/// ## Public
/// - `GET /schedules/:id/tickets`
/// - `GET /checkout/cancel?session_id=`
///
/// ## Authenticated
/// - `POST /schedules/:id/tickets` (cinema owner)
/// - `POST /tickets/:id/lock`, `POST /tickets/:id/unlock`
/// - `GET /checkout`, `POST /checkout`
///
/// ## Signed
/// - `POST /webhooks/payment`
pub fn reservation_routes() -> Router<ReservationAppState> {
    Router::new()
        .route(
            "/schedules/:id/tickets",
            get(list_tickets).post(generate_tickets),
        )
        .route("/tickets/:id/lock", post(lock_ticket))
        .route("/tickets/:id/unlock", post(unlock_ticket))
        .route("/checkout", get(get_checkout).post(begin_checkout))
        .route("/checkout/cancel", get(cancel_checkout))
        .route("/webhooks/payment", post(handle_payment_webhook))
}
