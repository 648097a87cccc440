//! CancelCheckoutHandler - The provider's "back to shop" redirect.
//!
//! Keyed by the remote session id only; the buyer need not be signed in.

use std::sync::Arc;

use crate::domain::foundation::PaymentSessionId;
use crate::domain::reservation::ReservationError;
use crate::ports::CheckoutSessionRepository;

use super::reconcile_checkout::{
    ReconcileCheckoutCommand, ReconcileCheckoutHandler, ReconcileOutcome,
};

#[derive(Debug, Clone)]
pub struct CancelCheckoutCommand {
    pub session_id: PaymentSessionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelCheckoutResult {
    Reconciled(ReconcileOutcome),
    /// No local session with that id; nothing to cancel.
    NoSession,
}

pub struct CancelCheckoutHandler {
    sessions: Arc<dyn CheckoutSessionRepository>,
    reconcile: Arc<ReconcileCheckoutHandler>,
}

impl CancelCheckoutHandler {
    pub fn new(
        sessions: Arc<dyn CheckoutSessionRepository>,
        reconcile: Arc<ReconcileCheckoutHandler>,
    ) -> Self {
        Self {
            sessions,
            reconcile,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelCheckoutCommand,
    ) -> Result<CancelCheckoutResult, ReservationError> {
        // Unknown ids never reach the provider.
        let Some(session) = self.sessions.find_by_session_id(&cmd.session_id).await? else {
            tracing::debug!(session_id = %cmd.session_id, "Cancel for unknown checkout session");
            return Ok(CancelCheckoutResult::NoSession);
        };

        let outcome = self
            .reconcile
            .handle(ReconcileCheckoutCommand { session })
            .await?;

        tracing::info!(session_id = %cmd.session_id, outcome = ?outcome, "Checkout cancelled");
        Ok(CancelCheckoutResult::Reconciled(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::reservation::test_support::{user, Fixture};
    use crate::domain::checkout::CheckoutSession;
    use crate::ports::{OpenSessionRequest, PaymentGateway, RemoteSessionStatus};

    fn handler(f: &Fixture) -> CancelCheckoutHandler {
        CancelCheckoutHandler::new(
            f.store.clone(),
            Arc::new(ReconcileCheckoutHandler::new(
                f.gateway.clone(),
                f.store.clone(),
                f.clock(),
            )),
        )
    }

    #[tokio::test]
    async fn cancel_expires_remote_and_drops_local() {
        let f = Fixture::new();
        let alice = user("alice").id;
        let remote = f
            .gateway
            .open_session(OpenSessionRequest {
                user_id: alice.clone(),
                line_items: vec![],
                currency: "usd".into(),
                success_url: "https://shop.test/ok".into(),
                cancel_url: "https://shop.test/cancel".into(),
                expires_at: f.start.plus_secs(1800),
            })
            .await
            .unwrap();
        f.store
            .create(&CheckoutSession::new(alice, remote.id.clone(), None, Vec::new(), f.start))
            .await
            .unwrap();

        let result = handler(&f)
            .handle(CancelCheckoutCommand {
                session_id: remote.id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(result, CancelCheckoutResult::Reconciled(ReconcileOutcome::Expired));
        assert_eq!(
            f.gateway.remote_session(&remote.id).unwrap().status,
            RemoteSessionStatus::Expired
        );
        assert_eq!(f.store.session_count(), 0);
    }

    #[tokio::test]
    async fn unknown_session_never_reaches_provider() {
        let f = Fixture::new();

        let result = handler(&f)
            .handle(CancelCheckoutCommand {
                session_id: PaymentSessionId::new("cs_nobody").unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(result, CancelCheckoutResult::NoSession);
        assert!(f.gateway.calls().is_empty());
    }
}
