//! ReconcileCheckoutHandler - Converges a local session with the provider.
//!
//! Used by the cancel callback and by the session expiry worker. The provider
//! is the source of truth:
//!
//! | Remote state | Action |
//! |--------------|--------|
//! | complete, paid | fulfill |
//! | open | expire remotely, then drop the local row |
//! | expired / unknown to provider | drop the local row |
//! | complete, unpaid | leave it; an async payment result is pending |
//! | complete, unpaid, past the pending deadline | drop the local row |
//!
//! Dropping the row unfreezes the user's locks, which then lapse through the
//! lock expiry reconciler.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::checkout::CheckoutSession;
use crate::domain::foundation::{PaymentSessionId, TicketId};
use crate::domain::reservation::ReservationError;
use crate::ports::{
    CheckoutSessionRepository, Clock, PaymentErrorCode, PaymentGateway, RemoteSession,
    RemoteSessionStatus,
};

use super::expire_checkout::{ExpireCheckoutCommand, ExpireCheckoutHandler};
use super::fulfill_checkout::{
    FulfillCheckoutCommand, FulfillCheckoutHandler, FulfillCheckoutResult,
};

#[derive(Debug, Clone)]
pub struct ReconcileCheckoutCommand {
    pub session: CheckoutSession,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Payment had gone through; tickets are sold.
    Fulfilled { sold: Vec<TicketId> },
    /// Still open remotely; expired there and dropped here.
    Expired,
    /// Already gone remotely; dropped here.
    Discarded,
    /// Completed but awaiting an asynchronous payment result.
    Pending,
    /// The asynchronous payment result never arrived in time; dropped here.
    Abandoned,
}

pub struct ReconcileCheckoutHandler {
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    fulfill: FulfillCheckoutHandler,
    expire: ExpireCheckoutHandler,
    /// Age, from session creation, after which a pending session is dropped.
    pending_deadline: Option<Duration>,
}

impl ReconcileCheckoutHandler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        sessions: Arc<dyn CheckoutSessionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            fulfill: FulfillCheckoutHandler::new(sessions.clone(), clock.clone()),
            expire: ExpireCheckoutHandler::new(sessions),
            clock,
            pending_deadline: None,
        }
    }

    /// Drops complete-but-unpaid sessions once they are older than `deadline`.
    pub fn with_pending_deadline(mut self, deadline: Duration) -> Self {
        self.pending_deadline = Some(deadline);
        self
    }

    fn pending_deadline_passed(&self, session: &CheckoutSession) -> bool {
        self.pending_deadline.map_or(false, |deadline| {
            !self.clock.now().is_before(&session.created_at.plus_std(deadline))
        })
    }

    pub async fn handle(
        &self,
        cmd: ReconcileCheckoutCommand,
    ) -> Result<ReconcileOutcome, ReservationError> {
        let session = cmd.session;

        let Some(remote) = self.fetch(&session.session_id).await? else {
            tracing::warn!(
                session_id = %session.session_id,
                "Provider does not know checkout session; discarding"
            );
            self.drop_local(&session.session_id).await?;
            return Ok(ReconcileOutcome::Discarded);
        };

        if remote.is_paid() {
            return self.fulfill(&session).await;
        }

        match remote.status {
            RemoteSessionStatus::Open => {
                self.gateway.expire_session(&session.session_id).await?;

                // The buyer may have paid between our read and the expire.
                if let Some(after) = self.fetch(&session.session_id).await? {
                    if after.is_paid() {
                        return self.fulfill(&session).await;
                    }
                }
                self.drop_local(&session.session_id).await?;
                Ok(ReconcileOutcome::Expired)
            }
            RemoteSessionStatus::Expired => {
                self.drop_local(&session.session_id).await?;
                Ok(ReconcileOutcome::Discarded)
            }
            RemoteSessionStatus::Complete if self.pending_deadline_passed(&session) => {
                tracing::error!(
                    session_id = %session.session_id,
                    user_id = %session.user_id,
                    payment_status = ?remote.payment_status,
                    "Payment result never arrived; abandoning checkout"
                );
                self.drop_local(&session.session_id).await?;
                Ok(ReconcileOutcome::Abandoned)
            }
            RemoteSessionStatus::Complete => {
                tracing::info!(
                    session_id = %session.session_id,
                    payment_status = ?remote.payment_status,
                    "Checkout session complete but unpaid; waiting for payment result"
                );
                Ok(ReconcileOutcome::Pending)
            }
        }
    }

    async fn fetch(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<Option<RemoteSession>, ReservationError> {
        match self.gateway.get_session(session_id).await {
            Ok(remote) => Ok(Some(remote)),
            Err(e) if e.code == PaymentErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn fulfill(&self, session: &CheckoutSession) -> Result<ReconcileOutcome, ReservationError> {
        let result = self
            .fulfill
            .handle(FulfillCheckoutCommand {
                session_id: session.session_id.clone(),
                user_id: session.user_id.clone(),
            })
            .await?;
        Ok(match result {
            FulfillCheckoutResult::Fulfilled { sold } => ReconcileOutcome::Fulfilled { sold },
            FulfillCheckoutResult::AlreadyProcessed => ReconcileOutcome::Discarded,
        })
    }

    async fn drop_local(&self, session_id: &PaymentSessionId) -> Result<(), ReservationError> {
        self.expire
            .handle(ExpireCheckoutCommand {
                session_id: session_id.clone(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::reservation::begin_checkout::{
        BeginCheckoutCommand, BeginCheckoutHandler, CheckoutSettings,
    };
    use crate::application::handlers::reservation::test_support::{user, Fixture};
    use crate::domain::ticket::TicketState;
    use crate::ports::{LockTicket, PaymentError, PaymentStatus, TicketRepository};
    use std::time::Duration;

    /// Locks the first ticket for alice and opens her checkout.
    async fn checked_out() -> (Fixture, Vec<TicketId>, CheckoutSession) {
        let (f, ids) = Fixture::new().with_tickets().await;
        f.store
            .lock(LockTicket {
                ticket_id: ids[0],
                user_id: user("alice").id,
                expected_version: None,
                now: f.start,
                expires_at: f.start.plus_secs(900),
            })
            .await
            .unwrap();
        BeginCheckoutHandler::new(
            f.store.clone(),
            f.store.clone(),
            f.gateway.clone(),
            f.clock(),
            CheckoutSettings {
                success_url: "https://shop.test/done".into(),
                cancel_url: "https://shop.test/cancel".into(),
                currency: "usd".into(),
                session_window: Duration::from_secs(1800),
            },
        )
        .handle(BeginCheckoutCommand { user: user("alice") })
        .await
        .unwrap();
        let session = f.store.find_by_user(&user("alice").id).await.unwrap().unwrap();
        (f, ids, session)
    }

    fn handler(f: &Fixture) -> ReconcileCheckoutHandler {
        ReconcileCheckoutHandler::new(f.gateway.clone(), f.store.clone(), f.clock())
    }

    #[tokio::test]
    async fn open_session_is_expired_remotely_and_dropped() {
        let (f, ids, session) = checked_out().await;

        let outcome = handler(&f)
            .handle(ReconcileCheckoutCommand {
                session: session.clone(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Expired);
        assert_eq!(
            f.gateway.remote_session(&session.session_id).unwrap().status,
            RemoteSessionStatus::Expired
        );
        assert_eq!(f.store.session_count(), 0);
        // tickets wait for their own lock window
        let ticket = f.store.find_by_id(ids[0]).await.unwrap().unwrap();
        assert_eq!(ticket.state(), TicketState::Locked);
    }

    #[tokio::test]
    async fn paid_session_is_fulfilled() {
        let (f, ids, session) = checked_out().await;
        f.gateway.pay(&session.session_id);

        let outcome = handler(&f)
            .handle(ReconcileCheckoutCommand { session })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Fulfilled { sold: vec![ids[0]] });
        assert_eq!(f.gateway.call_count("expire_session"), 0);
    }

    #[tokio::test]
    async fn forgotten_session_is_discarded() {
        let (f, _, session) = checked_out().await;
        f.gateway.forget(&session.session_id);

        let outcome = handler(&f)
            .handle(ReconcileCheckoutCommand { session })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Discarded);
        assert_eq!(f.store.session_count(), 0);
    }

    #[tokio::test]
    async fn unpaid_complete_session_is_left_pending() {
        let (f, _, session) = checked_out().await;
        f.gateway.set_remote_state(
            &session.session_id,
            RemoteSessionStatus::Complete,
            PaymentStatus::Unpaid,
        );

        let outcome = handler(&f)
            .handle(ReconcileCheckoutCommand { session })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Pending);
        assert_eq!(f.store.session_count(), 1);
    }

    #[tokio::test]
    async fn unpaid_complete_session_is_abandoned_at_its_deadline() {
        let (f, ids, session) = checked_out().await;
        f.gateway.set_remote_state(
            &session.session_id,
            RemoteSessionStatus::Complete,
            PaymentStatus::Unpaid,
        );
        let handler = handler(&f).with_pending_deadline(Duration::from_secs(3600));

        f.clock.advance_secs(3599);
        let outcome = handler
            .handle(ReconcileCheckoutCommand {
                session: session.clone(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Pending);

        f.clock.advance_secs(1);
        let outcome = handler
            .handle(ReconcileCheckoutCommand { session })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Abandoned);
        assert_eq!(f.store.session_count(), 0);
        // The seat is no longer frozen; its lock lapses on the next sweep.
        assert!(f.store.lock_for(ids[0]).is_some());
    }

    #[tokio::test]
    async fn provider_outage_keeps_local_row() {
        let (f, _, session) = checked_out().await;
        f.gateway
            .set_method_error("get_session", PaymentError::network("unreachable"));

        let err = handler(&f)
            .handle(ReconcileCheckoutCommand { session })
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::Upstream(_)));
        assert_eq!(f.store.session_count(), 1);
    }
}
