//! PostgreSQL implementation of CheckoutSessionRepository.
//!
//! `checkout_sessions.user_id` is the primary key, so the "one session per
//! user" rule is enforced by the database. Creation checks the priced ticket
//! set against the user's locks, and fulfillment sells that set and removes
//! the session, each in one SERIALIZABLE transaction.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::support::{
    begin_serializable, checkout_in_progress, commit, db_error, parse_user_id, sqlstate,
    with_timeout, TicketRow, UNIQUE_VIOLATION,
};
use crate::domain::checkout::CheckoutSession;
use crate::domain::foundation::{DomainError, PaymentSessionId, TicketId, Timestamp, UserId};
use crate::domain::ticket::{Ticket, TicketState};
use crate::ports::{CheckoutSessionRepository, FulfillOutcome};

pub struct PostgresCheckoutSessionRepository {
    pool: PgPool,
    op_timeout: Duration,
}

impl PostgresCheckoutSessionRepository {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    async fn create_in_tx(&self, session: &CheckoutSession) -> Result<(), DomainError> {
        let mut tx = begin_serializable(&self.pool).await?;

        let locked: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT ticket_id FROM ticket_locks WHERE user_id = $1 FOR UPDATE",
        )
        .bind(session.user_id.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("fetch locks for checkout", e))?;
        let locked: Vec<TicketId> = locked.into_iter().map(|(id,)| TicketId::from_uuid(id)).collect();
        if !session.covers_exactly(&locked) {
            return Err(DomainError::conflict("Locked tickets changed while the checkout was opening")
                .with_detail("user_id", session.user_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO checkout_sessions (user_id, session_id, checkout_url, ticket_ids, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.user_id.as_str())
        .bind(session.session_id.as_str())
        .bind(&session.checkout_url)
        .bind(uuids(&session.ticket_ids))
        .bind(session.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("checkout_sessions_pkey") {
                    return checkout_in_progress(&session.user_id);
                }
            }
            if sqlstate(&e).as_deref() == Some(UNIQUE_VIOLATION) {
                return DomainError::conflict("Checkout session id already recorded")
                    .with_detail("session_id", session.session_id.to_string());
            }
            db_error("create checkout session", e)
        })?;

        commit(tx).await
    }

    async fn fulfill_in_tx(
        &self,
        session_id: &PaymentSessionId,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<FulfillOutcome, DomainError> {
        let mut tx = begin_serializable(&self.pool).await?;

        let session: Option<(Vec<Uuid>,)> = sqlx::query_as(
            r#"
            SELECT ticket_ids FROM checkout_sessions
            WHERE user_id = $1 AND session_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_str())
        .bind(session_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("fetch checkout session", e))?;
        let Some((priced,)) = session else {
            return Ok(FulfillOutcome::NoSession);
        };

        let rows: Vec<TicketRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.schedule_id, t.seat_id, t.price, t.state, t.state_changed_at, t.version
            FROM tickets t
            JOIN ticket_locks l ON l.ticket_id = t.id
            WHERE l.user_id = $1 AND t.id = ANY($2)
            ORDER BY t.id
            FOR UPDATE OF t
            "#,
        )
        .bind(user_id.as_str())
        .bind(&priced)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("fetch locked tickets", e))?;
        if rows.len() != priced.len() {
            return Err(DomainError::conflict("Priced ticket is no longer locked by the buyer")
                .with_detail("session_id", session_id.to_string()));
        }

        // Every ticket must be sellable before any row is written.
        let mut sold: Vec<TicketId> = Vec::with_capacity(rows.len());
        for row in rows {
            let ticket = Ticket::try_from(row)?;
            ticket.transitioned(TicketState::Sold, now)?;
            sold.push(ticket.id());
        }
        let ids = uuids(&sold);

        let updated = sqlx::query(
            r#"
            UPDATE tickets SET
                state = 'sold',
                state_changed_at = $2,
                version = version + 1
            WHERE id = ANY($1) AND state = 'locked'
            "#,
        )
        .bind(&ids)
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("sell tickets", e))?;
        if updated.rows_affected() != ids.len() as u64 {
            return Err(DomainError::conflict("Locked tickets changed during fulfillment"));
        }

        sqlx::query("DELETE FROM ticket_locks WHERE user_id = $1 AND ticket_id = ANY($2)")
            .bind(user_id.as_str())
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete ticket locks", e))?;

        sqlx::query("DELETE FROM checkout_sessions WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete checkout session", e))?;

        commit(tx).await?;
        sold.sort();
        Ok(FulfillOutcome::Fulfilled { sold })
    }
}

fn uuids(ids: &[TicketId]) -> Vec<Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}

const SESSION_COLUMNS: &str = "user_id, session_id, checkout_url, ticket_ids, created_at, next_check_at";

#[derive(Debug, sqlx::FromRow)]
struct CheckoutSessionRow {
    user_id: String,
    session_id: String,
    checkout_url: Option<String>,
    ticket_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    next_check_at: Option<DateTime<Utc>>,
}

impl TryFrom<CheckoutSessionRow> for CheckoutSession {
    type Error = DomainError;

    fn try_from(row: CheckoutSessionRow) -> Result<Self, Self::Error> {
        let session_id = PaymentSessionId::new(row.session_id)
            .map_err(|e| DomainError::database(format!("Invalid session id: {}", e)))?;
        let mut session = CheckoutSession::new(
            parse_user_id(row.user_id)?,
            session_id,
            row.checkout_url,
            row.ticket_ids.into_iter().map(TicketId::from_uuid).collect(),
            Timestamp::from_datetime(row.created_at),
        );
        session.next_check_at = row.next_check_at.map(Timestamp::from_datetime);
        Ok(session)
    }
}

#[async_trait]
impl CheckoutSessionRepository for PostgresCheckoutSessionRepository {
    async fn create(&self, session: &CheckoutSession) -> Result<(), DomainError> {
        with_timeout(
            self.op_timeout,
            "create checkout session",
            self.create_in_tx(session),
        )
        .await
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<CheckoutSession>, DomainError> {
        with_timeout(self.op_timeout, "find checkout session", async {
            let row: Option<CheckoutSessionRow> = sqlx::query_as(&format!(
                "SELECT {} FROM checkout_sessions WHERE user_id = $1",
                SESSION_COLUMNS
            ))
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find checkout session", e))?;

            row.map(CheckoutSession::try_from).transpose()
        })
        .await
    }

    async fn find_by_session_id(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<Option<CheckoutSession>, DomainError> {
        with_timeout(self.op_timeout, "find checkout session", async {
            let row: Option<CheckoutSessionRow> = sqlx::query_as(&format!(
                "SELECT {} FROM checkout_sessions WHERE session_id = $1",
                SESSION_COLUMNS
            ))
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find checkout session", e))?;

            row.map(CheckoutSession::try_from).transpose()
        })
        .await
    }

    async fn fulfill(
        &self,
        session_id: &PaymentSessionId,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<FulfillOutcome, DomainError> {
        let outcome = with_timeout(
            self.op_timeout,
            "fulfill checkout",
            self.fulfill_in_tx(session_id, user_id, now),
        )
        .await?;
        if let FulfillOutcome::Fulfilled { sold } = &outcome {
            tracing::info!(%session_id, %user_id, sold = sold.len(), "Checkout fulfilled");
        }
        Ok(outcome)
    }

    async fn delete_by_session_id(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<bool, DomainError> {
        with_timeout(self.op_timeout, "delete checkout session", async {
            let result = sqlx::query("DELETE FROM checkout_sessions WHERE session_id = $1")
                .bind(session_id.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("delete checkout session", e))?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn find_due(
        &self,
        cutoff: Timestamp,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<CheckoutSession>, DomainError> {
        with_timeout(self.op_timeout, "find stale checkout sessions", async {
            let rows: Vec<CheckoutSessionRow> = sqlx::query_as(&format!(
                r#"
                SELECT {}
                FROM checkout_sessions
                WHERE created_at < $1
                  AND (next_check_at IS NULL OR next_check_at <= $2)
                ORDER BY COALESCE(next_check_at, created_at), created_at
                LIMIT $3
                "#,
                SESSION_COLUMNS
            ))
            .bind(cutoff.as_datetime())
            .bind(now.as_datetime())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("find stale checkout sessions", e))?;

            rows.into_iter().map(CheckoutSession::try_from).collect()
        })
        .await
    }

    async fn defer(
        &self,
        session_id: &PaymentSessionId,
        until: Timestamp,
    ) -> Result<bool, DomainError> {
        with_timeout(self.op_timeout, "defer checkout session", async {
            let result =
                sqlx::query("UPDATE checkout_sessions SET next_check_at = $2 WHERE session_id = $1")
                    .bind(session_id.as_str())
                    .bind(until.as_datetime())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| db_error("defer checkout session", e))?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}
