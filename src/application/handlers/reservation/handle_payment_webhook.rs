//! HandlePaymentWebhookHandler - Command handler for payment provider notifications.

use std::sync::Arc;

use crate::domain::foundation::{TicketId, UserId};
use crate::domain::reservation::ReservationError;
use crate::ports::{
    CheckoutSessionRepository, Clock, PaymentGateway, RemoteSession, WebhookEvent,
    WebhookEventType,
};

use super::expire_checkout::{ExpireCheckoutCommand, ExpireCheckoutHandler};
use super::fulfill_checkout::{
    FulfillCheckoutCommand, FulfillCheckoutHandler, FulfillCheckoutResult,
};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload.
    pub payload: Vec<u8>,
    /// Webhook signature header.
    pub signature: String,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentWebhookResult {
    /// Payment confirmed, tickets sold.
    Fulfilled { sold: Vec<TicketId> },
    /// Payment attempt over, session row removed.
    SessionExpired,
    /// Nothing left to do; a previous delivery or reconciler got there first.
    AlreadyProcessed,
    /// Event acknowledged but no action taken.
    Acknowledged,
    /// Event ignored (unknown or unsupported type).
    Ignored,
}

/// Handler for processing payment provider webhooks.
///
/// Deliveries may repeat or arrive out of order; every branch is idempotent.
pub struct HandlePaymentWebhookHandler {
    gateway: Arc<dyn PaymentGateway>,
    sessions: Arc<dyn CheckoutSessionRepository>,
    fulfill: FulfillCheckoutHandler,
    expire: ExpireCheckoutHandler,
}

impl HandlePaymentWebhookHandler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        sessions: Arc<dyn CheckoutSessionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            fulfill: FulfillCheckoutHandler::new(sessions.clone(), clock),
            expire: ExpireCheckoutHandler::new(sessions.clone()),
            sessions,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, ReservationError> {
        // 1. Verify webhook signature and parse event
        let event = self
            .gateway
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected payment webhook");
                ReservationError::invalid_webhook(e.message)
            })?;

        tracing::debug!(
            event_id = %event.id,
            event_type = event.event_type.as_provider_str(),
            "Payment webhook received"
        );

        // 2. Process based on event type
        match &event.event_type {
            WebhookEventType::CheckoutSessionCompleted => {
                let session = required_session(&event)?;
                if session.is_paid() {
                    self.fulfill(session).await
                } else {
                    // Delayed payment methods report later via async_payment_*.
                    tracing::info!(
                        session_id = %session.id,
                        "Checkout completed without payment yet; awaiting async result"
                    );
                    Ok(HandlePaymentWebhookResult::Acknowledged)
                }
            }
            WebhookEventType::CheckoutSessionAsyncPaymentSucceeded => {
                self.fulfill(required_session(&event)?).await
            }
            WebhookEventType::CheckoutSessionExpired
            | WebhookEventType::CheckoutSessionAsyncPaymentFailed => {
                let session = required_session(&event)?;
                let deleted = self
                    .expire
                    .handle(ExpireCheckoutCommand {
                        session_id: session.id.clone(),
                    })
                    .await?;
                Ok(if deleted {
                    HandlePaymentWebhookResult::SessionExpired
                } else {
                    HandlePaymentWebhookResult::AlreadyProcessed
                })
            }
            WebhookEventType::Unknown(name) => {
                tracing::debug!(event_type = %name, "Ignoring payment webhook");
                Ok(HandlePaymentWebhookResult::Ignored)
            }
        }
    }

    async fn fulfill(
        &self,
        session: &RemoteSession,
    ) -> Result<HandlePaymentWebhookResult, ReservationError> {
        let Some(user_id) = self.owner_of(session).await? else {
            return Ok(HandlePaymentWebhookResult::AlreadyProcessed);
        };

        let result = self
            .fulfill
            .handle(FulfillCheckoutCommand {
                session_id: session.id.clone(),
                user_id,
            })
            .await?;

        Ok(match result {
            FulfillCheckoutResult::Fulfilled { sold } => {
                HandlePaymentWebhookResult::Fulfilled { sold }
            }
            FulfillCheckoutResult::AlreadyProcessed => HandlePaymentWebhookResult::AlreadyProcessed,
        })
    }

    /// The buyer as echoed by the provider, else from our session row.
    async fn owner_of(&self, session: &RemoteSession) -> Result<Option<UserId>, ReservationError> {
        if let Some(user_id) = &session.user_id {
            return Ok(Some(user_id.clone()));
        }
        Ok(self
            .sessions
            .find_by_session_id(&session.id)
            .await?
            .map(|s| s.user_id))
    }
}

fn required_session(event: &WebhookEvent) -> Result<&RemoteSession, ReservationError> {
    event.session.as_ref().ok_or_else(|| {
        ReservationError::invalid_webhook(format!(
            "{} event carries no checkout session",
            event.event_type.as_provider_str()
        ))
    })
}
