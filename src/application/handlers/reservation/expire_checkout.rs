//! ExpireCheckoutHandler - Command handler for abandoned payment attempts.

use std::sync::Arc;

use crate::domain::foundation::PaymentSessionId;
use crate::domain::reservation::ReservationError;
use crate::ports::CheckoutSessionRepository;

#[derive(Debug, Clone)]
pub struct ExpireCheckoutCommand {
    pub session_id: PaymentSessionId,
}

/// Drops the local session row.
///
/// The user's tickets stay locked; their own lock window decides when they
/// return to sale.
#[derive(Clone)]
pub struct ExpireCheckoutHandler {
    sessions: Arc<dyn CheckoutSessionRepository>,
}

impl ExpireCheckoutHandler {
    pub fn new(sessions: Arc<dyn CheckoutSessionRepository>) -> Self {
        Self { sessions }
    }

    /// Returns whether a row was deleted.
    pub async fn handle(&self, cmd: ExpireCheckoutCommand) -> Result<bool, ReservationError> {
        let deleted = self.sessions.delete_by_session_id(&cmd.session_id).await?;
        if deleted {
            tracing::info!(session_id = %cmd.session_id, "Checkout session expired");
        }
        Ok(deleted)
    }
}
