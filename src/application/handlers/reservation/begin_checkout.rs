//! BeginCheckoutHandler - Command handler for starting a payment attempt.
//!
//! Checkout is a two-step saga: open the remote session, then record it
//! locally. If recording fails the remote session is expired before the error
//! is returned. A crash between the two steps leaves an orphan remote session
//! that simply runs out on the provider's side.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{PaymentConfig, ReservationConfig};
use crate::domain::checkout::{build_line_items, total, CheckoutSession};
use crate::domain::foundation::{
    AuthenticatedUser, Money, PaymentSessionId, TicketId, Timestamp,
};
use crate::domain::reservation::ReservationError;
use crate::ports::{
    CheckoutSessionRepository, Clock, OpenSessionRequest, PaymentGateway, TicketReader,
};

use super::access::ensure_activated;

/// Redirects, currency and lifetime for new payment sessions.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    pub session_window: Duration,
}

impl CheckoutSettings {
    pub fn from_config(payment: &PaymentConfig, reservation: &ReservationConfig) -> Self {
        Self {
            success_url: payment.success_url.clone(),
            cancel_url: payment.cancel_url.clone(),
            currency: payment.currency.clone(),
            session_window: reservation.session_window(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BeginCheckoutCommand {
    pub user: AuthenticatedUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginCheckoutResult {
    pub session_id: PaymentSessionId,
    /// Hosted payment page to redirect the buyer to.
    pub url: Option<String>,
    pub expires_at: Timestamp,
    pub total: Money,
}

pub struct BeginCheckoutHandler {
    reader: Arc<dyn TicketReader>,
    sessions: Arc<dyn CheckoutSessionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    settings: CheckoutSettings,
}

impl BeginCheckoutHandler {
    pub fn new(
        reader: Arc<dyn TicketReader>,
        sessions: Arc<dyn CheckoutSessionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            reader,
            sessions,
            gateway,
            clock,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: BeginCheckoutCommand,
    ) -> Result<BeginCheckoutResult, ReservationError> {
        ensure_activated(&cmd.user)?;
        let user_id = cmd.user.id;

        // 1. One payment attempt at a time
        if self.sessions.find_by_user(&user_id).await?.is_some() {
            return Err(ReservationError::checkout_in_progress());
        }

        // 2. Price the basket
        let locked = self.reader.find_locked_by_user(&user_id).await?;
        if locked.is_empty() {
            return Err(ReservationError::no_locked_tickets());
        }
        let line_items = build_line_items(&locked);
        let amount = total(&line_items);
        let priced: Vec<TicketId> = locked.iter().map(|l| l.ticket.id()).collect();

        // 3. Open the remote session
        let now = self.clock.now();
        let expires_at = now.plus_std(self.settings.session_window);
        let remote = self
            .gateway
            .open_session(OpenSessionRequest {
                user_id: user_id.clone(),
                line_items,
                currency: self.settings.currency.clone(),
                success_url: self.settings.success_url.clone(),
                cancel_url: self.settings.cancel_url.clone(),
                expires_at,
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to open payment session");
                ReservationError::from(e)
            })?;

        // 4. Record it against the priced set, compensating on failure
        let session = CheckoutSession::new(
            user_id.clone(),
            remote.id.clone(),
            remote.url.clone(),
            priced,
            now,
        );
        if let Err(err) = self.sessions.create(&session).await {
            tracing::warn!(
                user_id = %user_id,
                session_id = %remote.id,
                error = %err,
                "Failed to record checkout session, expiring remote session"
            );
            if let Err(expire_err) = self.gateway.expire_session(&remote.id).await {
                tracing::error!(
                    session_id = %remote.id,
                    error = %expire_err,
                    "Compensating expire failed; provider will time the session out"
                );
            }
            return Err(err.into());
        }

        tracing::info!(
            user_id = %user_id,
            session_id = %remote.id,
            tickets = locked.len(),
            total = %amount,
            "Checkout started"
        );

        Ok(BeginCheckoutResult {
            session_id: remote.id,
            url: remote.url,
            expires_at,
            total: amount,
        })
    }
}
