//! Session expiry reconciler: converges checkout sessions older than the
//! session window with the payment provider.
//!
//! A session still waiting on an asynchronous payment result is deferred by
//! one session window so it stops occupying the head of the batch, and is
//! abandoned once it outlives the window plus the configured grace.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::handlers::reservation::{
    ReconcileCheckoutCommand, ReconcileCheckoutHandler, ReconcileOutcome,
};
use crate::domain::foundation::DomainError;
use crate::ports::{CheckoutSessionRepository, Clock, PaymentGateway};

use super::reconciler::{Reconciler, SweepReport};

pub struct SessionExpiryReconciler {
    sessions: Arc<dyn CheckoutSessionRepository>,
    reconcile: ReconcileCheckoutHandler,
    clock: Arc<dyn Clock>,
    session_window: Duration,
    batch_size: u32,
}

impl SessionExpiryReconciler {
    pub fn new(
        sessions: Arc<dyn CheckoutSessionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        session_window: Duration,
        payment_grace: Duration,
        batch_size: u32,
    ) -> Self {
        Self {
            reconcile: ReconcileCheckoutHandler::new(gateway, sessions.clone(), clock.clone())
                .with_pending_deadline(session_window + payment_grace),
            sessions,
            clock,
            session_window,
            batch_size,
        }
    }
}

#[async_trait]
impl Reconciler for SessionExpiryReconciler {
    fn name(&self) -> &'static str {
        "session_expiry"
    }

    async fn sweep(&self) -> Result<SweepReport, DomainError> {
        let now = self.clock.now();
        let cutoff = now.minus_std(self.session_window);
        let stale = self
            .sessions
            .find_due(cutoff, now, self.batch_size)
            .await?;

        let mut report = SweepReport::default();
        for session in stale {
            let session_id = session.session_id.clone();
            let user_id = session.user_id.clone();
            match self.reconcile.handle(ReconcileCheckoutCommand { session }).await {
                Ok(ReconcileOutcome::Pending) => {
                    let recheck_at = now.plus_std(self.session_window);
                    if let Err(e) = self.sessions.defer(&session_id, recheck_at).await {
                        tracing::warn!(%session_id, error = %e, "Pending checkout session not deferred");
                        report.failed += 1;
                    }
                }
                Ok(outcome) => {
                    tracing::info!(%session_id, %user_id, ?outcome, "Stale checkout session reconciled");
                    report.processed += 1;
                }
                Err(e) => {
                    tracing::warn!(%session_id, %user_id, error = %e, "Stale checkout session not reconciled");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryStore, ManualClock};
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::adapters::workers::LockExpiryReconciler;
    use crate::application::handlers::reservation::{
        BeginCheckoutCommand, BeginCheckoutHandler, CheckoutSettings,
    };
    use crate::domain::checkout::CheckoutSession;
    use crate::domain::foundation::{AuthenticatedUser, Money, Timestamp, UserId};
    use crate::domain::ticket::TicketState;
    use crate::ports::{
        CreateTickets, LockTicket, OpenSessionRequest, PaymentError, PaymentStatus,
        RemoteSessionStatus, TicketRepository,
    };

    const WINDOW: Duration = Duration::from_secs(30 * 60);
    const GRACE: Duration = Duration::from_secs(24 * 60 * 60);

    struct Setup {
        store: Arc<InMemoryStore>,
        gateway: Arc<MockPaymentGateway>,
        clock: Arc<ManualClock>,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                store: Arc::new(InMemoryStore::new()),
                gateway: Arc::new(MockPaymentGateway::new()),
                clock: Arc::new(ManualClock::new(Timestamp::now())),
            }
        }

        fn reconciler(&self) -> SessionExpiryReconciler {
            self.reconciler_with_batch(50)
        }

        fn reconciler_with_batch(&self, batch_size: u32) -> SessionExpiryReconciler {
            SessionExpiryReconciler::new(
                self.store.clone(),
                self.gateway.clone(),
                self.clock.clone(),
                WINDOW,
                GRACE,
                batch_size,
            )
        }

        fn complete_unpaid(&self, session: &CheckoutSession) {
            self.gateway.set_remote_state(
                &session.session_id,
                RemoteSessionStatus::Complete,
                PaymentStatus::Unpaid,
            );
        }

        async fn open_checkout(&self, user: &str) -> CheckoutSession {
            let now = self.clock.now();
            let user_id = UserId::new(user).unwrap();
            let remote = self
                .gateway
                .open_session(OpenSessionRequest {
                    user_id: user_id.clone(),
                    line_items: Vec::new(),
                    currency: "usd".into(),
                    success_url: "https://example.test/ok".into(),
                    cancel_url: "https://example.test/cancel".into(),
                    expires_at: now.plus_std(WINDOW),
                })
                .await
                .unwrap();
            let session = CheckoutSession::new(user_id, remote.id, remote.url, Vec::new(), now);
            self.store.create(&session).await.unwrap();
            session
        }
    }

    #[tokio::test]
    async fn expires_stale_open_sessions_and_leaves_fresh_ones() {
        let setup = Setup::new();
        let stale = setup.open_checkout("alice").await;
        setup.clock.advance_secs(25 * 60);
        let fresh = setup.open_checkout("bob").await;
        setup.clock.advance_secs(10 * 60);

        let report = setup.reconciler().sweep().await.unwrap();

        assert_eq!(report, SweepReport { processed: 1, failed: 0 });
        assert_eq!(
            setup.gateway.remote_session(&stale.session_id).unwrap().status,
            RemoteSessionStatus::Expired
        );
        assert!(setup.store.find_by_session_id(&stale.session_id).await.unwrap().is_none());
        assert!(setup.store.find_by_session_id(&fresh.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn discards_sessions_the_provider_forgot() {
        let setup = Setup::new();
        let session = setup.open_checkout("alice").await;
        setup.gateway.forget(&session.session_id);
        setup.clock.advance_secs(31 * 60);

        let report = setup.reconciler().sweep().await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(setup.store.session_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_counted_and_retried_next_tick() {
        let setup = Setup::new();
        setup.open_checkout("alice").await;
        setup.clock.advance_secs(31 * 60);
        setup
            .gateway
            .set_method_error("get_session", PaymentError::network("connection reset"));

        let report = setup.reconciler().sweep().await.unwrap();
        assert_eq!(report, SweepReport { processed: 0, failed: 1 });
        assert_eq!(setup.store.session_count(), 1);

        setup.gateway.clear_errors();
        let report = setup.reconciler().sweep().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(setup.store.session_count(), 0);
    }

    #[tokio::test]
    async fn unpaid_checkout_is_abandoned_and_its_seat_returns_to_sale() {
        let setup = Setup::new();
        let start = setup.clock.now();
        let cinema = setup.store.add_cinema(UserId::new("owner").unwrap(), "Odeon");
        let hall = setup.store.add_hall(cinema, "Hall 1", Money::ZERO);
        let seats = setup.store.add_seats(hall, 1, 1);
        let movie = setup.store.add_movie("Alien");
        let schedule = setup.store.add_schedule(
            hall,
            movie,
            start.plus_secs(30 * 86400),
            Money::from_cents(900).unwrap(),
        );
        setup
            .store
            .create_all_for_schedule(CreateTickets {
                schedule_id: schedule,
                seat_ids: seats,
                price: Money::from_cents(900).unwrap(),
                now: start,
            })
            .await
            .unwrap();
        let ticket = setup.store.tickets_for(schedule)[0].clone();
        let alice = AuthenticatedUser::new(
            UserId::new("alice").unwrap(),
            String::from("alice@example.test"),
            None,
            true,
        );
        setup
            .store
            .lock(LockTicket {
                ticket_id: ticket.id(),
                user_id: alice.id.clone(),
                expected_version: None,
                now: start,
                expires_at: start.plus_secs(15 * 60),
            })
            .await
            .unwrap();
        let checkout = BeginCheckoutHandler::new(
            setup.store.clone(),
            setup.store.clone(),
            setup.gateway.clone(),
            setup.clock.clone(),
            CheckoutSettings {
                success_url: "https://example.test/ok".into(),
                cancel_url: "https://example.test/cancel".into(),
                currency: "usd".into(),
                session_window: WINDOW,
            },
        )
        .handle(BeginCheckoutCommand { user: alice.clone() })
        .await
        .unwrap();
        let session = setup.store.find_by_session_id(&checkout.session_id).await.unwrap().unwrap();
        setup.complete_unpaid(&session);

        let sessions = setup.reconciler();
        let locks = LockExpiryReconciler::new(setup.store.clone(), setup.clock.clone(), 100);
        let deadline = (WINDOW + GRACE).as_secs() as i64;
        for hour in 1..=7 * 24_i64 {
            setup.clock.advance_secs(3600);
            sessions.sweep().await.unwrap();
            locks.sweep().await.unwrap();

            let state = setup.store.tickets_for(schedule)[0].state();
            if hour * 3600 < deadline {
                assert_eq!(setup.store.session_count(), 1, "hour {}", hour);
                assert_eq!(state, TicketState::Locked, "hour {}", hour);
            }
        }

        assert_eq!(setup.store.session_count(), 0);
        assert_eq!(setup.store.lock_count(), 0);
        assert_eq!(setup.store.tickets_for(schedule)[0].state(), TicketState::Unsold);
    }

    #[tokio::test]
    async fn pending_backlog_does_not_block_newer_stale_sessions() {
        let setup = Setup::new();
        for user in ["alice", "bob"] {
            let session = setup.open_checkout(user).await;
            setup.complete_unpaid(&session);
        }
        setup.clock.advance_secs(5 * 60);
        let carol = setup.open_checkout("carol").await;
        setup.clock.advance_secs(31 * 60);
        let reconciler = setup.reconciler_with_batch(2);

        // The two pending sessions fill the first batch and are deferred.
        let first = reconciler.sweep().await.unwrap();
        assert_eq!(first, SweepReport { processed: 0, failed: 0 });

        let second = reconciler.sweep().await.unwrap();

        assert_eq!(second, SweepReport { processed: 1, failed: 0 });
        assert_eq!(
            setup.gateway.remote_session(&carol.session_id).unwrap().status,
            RemoteSessionStatus::Expired
        );
        assert!(setup.store.find_by_session_id(&carol.session_id).await.unwrap().is_none());
        assert_eq!(setup.store.session_count(), 2);
        // Carol is read once before and once after the remote expire.
        assert_eq!(setup.gateway.call_count("get_session"), 4);
    }
}
