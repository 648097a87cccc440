//! FulfillCheckoutHandler - Command handler for confirmed payments.

use std::sync::Arc;

use crate::domain::foundation::{PaymentSessionId, TicketId, UserId};
use crate::domain::reservation::ReservationError;
use crate::ports::{CheckoutSessionRepository, Clock, FulfillOutcome};

#[derive(Debug, Clone)]
pub struct FulfillCheckoutCommand {
    pub session_id: PaymentSessionId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillCheckoutResult {
    /// The tickets priced into the session are now sold.
    Fulfilled { sold: Vec<TicketId> },
    /// No matching session; an earlier notification already settled it.
    AlreadyProcessed,
}

/// Marks the session's priced tickets as sold and closes the session.
///
/// Safe to call repeatedly for the same session.
#[derive(Clone)]
pub struct FulfillCheckoutHandler {
    sessions: Arc<dyn CheckoutSessionRepository>,
    clock: Arc<dyn Clock>,
}

impl FulfillCheckoutHandler {
    pub fn new(sessions: Arc<dyn CheckoutSessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { sessions, clock }
    }

    pub async fn handle(
        &self,
        cmd: FulfillCheckoutCommand,
    ) -> Result<FulfillCheckoutResult, ReservationError> {
        let outcome = self
            .sessions
            .fulfill(&cmd.session_id, &cmd.user_id, self.clock.now())
            .await?;

        match outcome {
            FulfillOutcome::Fulfilled { sold } => {
                tracing::info!(
                    session_id = %cmd.session_id,
                    user_id = %cmd.user_id,
                    sold = sold.len(),
                    "Checkout fulfilled"
                );
                Ok(FulfillCheckoutResult::Fulfilled { sold })
            }
            FulfillOutcome::NoSession => {
                tracing::debug!(
                    session_id = %cmd.session_id,
                    "No checkout session to fulfill; already processed"
                );
                Ok(FulfillCheckoutResult::AlreadyProcessed)
            }
        }
    }
}
