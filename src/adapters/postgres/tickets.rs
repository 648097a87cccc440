//! PostgreSQL implementation of TicketRepository.
//!
//! Each transition runs in a SERIALIZABLE transaction that re-reads the
//! ticket, applies the domain rules and writes the ticket row together with
//! its `ticket_locks` record. Losing a serialization race surfaces as
//! `ErrorCode::Conflict`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::support::{
    begin_serializable, checkout_in_progress, commit, db_error, sqlstate,
    ticket_not_found, with_timeout, TicketRow, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION,
};
use crate::domain::foundation::{DomainError, ErrorCode, ScheduleId, TicketId, Timestamp, UserId};
use crate::domain::ticket::{Ticket, TicketState};
use crate::ports::{CreateTickets, ExpiredLockSweep, LockTicket, TicketRepository, UnlockTicket};

/// PostgreSQL implementation of the TicketRepository port.
pub struct PostgresTicketRepository {
    pool: PgPool,
    op_timeout: Duration,
}

impl PostgresTicketRepository {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    async fn fetch_for_update(
        tx: &mut Transaction<'static, Postgres>,
        id: TicketId,
    ) -> Result<Ticket, DomainError> {
        let row: Option<TicketRow> = sqlx::query_as(
            r#"
            SELECT id, schedule_id, seat_id, price, state, state_changed_at, version
            FROM tickets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| db_error("fetch ticket", e))?;

        row.ok_or_else(|| ticket_not_found(id))?.try_into()
    }

    async fn has_session(
        tx: &mut Transaction<'static, Postgres>,
        user_id: &UserId,
    ) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM checkout_sessions WHERE user_id = $1)",
        )
        .bind(user_id.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| db_error("check checkout session", e))?;
        Ok(exists)
    }

    /// Persists a transition computed from `previous`, guarding on its version.
    async fn write_transition(
        tx: &mut Transaction<'static, Postgres>,
        previous: &Ticket,
        next: &Ticket,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE tickets SET
                state = $2,
                state_changed_at = $3,
                version = $4
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(next.id().as_uuid())
        .bind(next.state().as_str())
        .bind(next.state_changed_at().as_datetime())
        .bind(next.version())
        .bind(previous.version())
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("update ticket", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::conflict("Ticket changed during update")
                .with_detail("ticket_id", next.id().to_string()));
        }
        Ok(())
    }

    async fn lock_in_tx(&self, request: &LockTicket) -> Result<Ticket, DomainError> {
        let mut tx = begin_serializable(&self.pool).await?;

        let current = Self::fetch_for_update(&mut tx, request.ticket_id).await?;
        let locked = current.transitioned(TicketState::Locked, request.now)?;
        if let Some(expected) = request.expected_version {
            current.check_version(expected)?;
        }

        let starts_at: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT starts_at FROM schedules WHERE id = $1")
                .bind(current.schedule_id().as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("fetch schedule", e))?;
        let (starts_at,) = starts_at.ok_or_else(|| schedule_missing(current.schedule_id()))?;
        if !request.now.is_before(&Timestamp::from_datetime(starts_at)) {
            return Err(DomainError::new(
                ErrorCode::ScheduleStarted,
                format!("Schedule {} has already started", current.schedule_id()),
            ));
        }

        if Self::has_session(&mut tx, &request.user_id).await? {
            return Err(checkout_in_progress(&request.user_id));
        }

        Self::write_transition(&mut tx, &current, &locked).await?;

        sqlx::query(
            r#"
            INSERT INTO ticket_locks (ticket_id, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(locked.id().as_uuid())
        .bind(request.user_id.as_str())
        .bind(request.expires_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if sqlstate(&e).as_deref() == Some(UNIQUE_VIOLATION) {
                return DomainError::new(ErrorCode::TicketUnavailable, "Ticket is already locked")
                    .with_detail("ticket_id", request.ticket_id.to_string());
            }
            db_error("insert ticket lock", e)
        })?;

        commit(tx).await?;
        Ok(locked)
    }

    async fn unlock_in_tx(&self, request: &UnlockTicket) -> Result<Ticket, DomainError> {
        let mut tx = begin_serializable(&self.pool).await?;

        let current = Self::fetch_for_update(&mut tx, request.ticket_id).await?;

        let holder: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM ticket_locks WHERE ticket_id = $1")
                .bind(request.ticket_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("fetch ticket lock", e))?;
        let (holder,) = holder.ok_or_else(|| {
            DomainError::new(ErrorCode::TicketUnavailable, "Ticket is not locked")
                .with_detail("ticket_id", request.ticket_id.to_string())
        })?;
        if holder != request.user_id.as_str() {
            return Err(DomainError::new(
                ErrorCode::Forbidden,
                "Ticket is locked by another user",
            ));
        }
        if Self::has_session(&mut tx, &request.user_id).await? {
            return Err(checkout_in_progress(&request.user_id));
        }
        if let Some(expected) = request.expected_version {
            current.check_version(expected)?;
        }
        let unlocked = current.transitioned(TicketState::Unsold, request.now)?;

        Self::write_transition(&mut tx, &current, &unlocked).await?;
        Self::delete_lock(&mut tx, request.ticket_id).await?;

        commit(tx).await?;
        Ok(unlocked)
    }

    async fn delete_lock(
        tx: &mut Transaction<'static, Postgres>,
        ticket_id: TicketId,
    ) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM ticket_locks WHERE ticket_id = $1")
            .bind(ticket_id.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("delete ticket lock", e))?;
        Ok(())
    }

    /// Releases one expired lock. Returns `false` when the lock no longer
    /// qualifies (released, renewed into a checkout or already sold).
    async fn release_expired(&self, ticket_id: TicketId, now: Timestamp) -> Result<bool, DomainError> {
        let mut tx = begin_serializable(&self.pool).await?;

        let still_expired: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT l.user_id
            FROM ticket_locks l
            WHERE l.ticket_id = $1
              AND l.expires_at <= $2
              AND NOT EXISTS (SELECT 1 FROM checkout_sessions s WHERE s.user_id = l.user_id)
            "#,
        )
        .bind(ticket_id.as_uuid())
        .bind(now.as_datetime())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("recheck expired lock", e))?;
        if still_expired.is_none() {
            return Ok(false);
        }

        let current = Self::fetch_for_update(&mut tx, ticket_id).await?;
        let unsold = current.transitioned(TicketState::Unsold, now)?;
        Self::write_transition(&mut tx, &current, &unsold).await?;
        Self::delete_lock(&mut tx, ticket_id).await?;

        commit(tx).await?;
        Ok(true)
    }
}

#[async_trait]
impl TicketRepository for PostgresTicketRepository {
    async fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, DomainError> {
        with_timeout(self.op_timeout, "find ticket", async {
            let row: Option<TicketRow> = sqlx::query_as(
                r#"
                SELECT id, schedule_id, seat_id, price, state, state_changed_at, version
                FROM tickets
                WHERE id = $1
                "#,
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find ticket", e))?;

            row.map(Ticket::try_from).transpose()
        })
        .await
    }

    async fn create_all_for_schedule(&self, request: CreateTickets) -> Result<u64, DomainError> {
        let ids: Vec<Uuid> = request.seat_ids.iter().map(|_| Uuid::new_v4()).collect();
        let seats: Vec<Uuid> = request.seat_ids.iter().map(|s| *s.as_uuid()).collect();
        let schedule_id = request.schedule_id;

        with_timeout(self.op_timeout, "create tickets", async {
            let result = sqlx::query(
                r#"
                INSERT INTO tickets (id, schedule_id, seat_id, price, state, state_changed_at, version)
                SELECT t.id, $3, t.seat_id, $4, 'unsold', $5, 0
                FROM UNNEST($1::uuid[], $2::uuid[]) AS t(id, seat_id)
                ON CONFLICT ON CONSTRAINT tickets_schedule_seat_key DO NOTHING
                "#,
            )
            .bind(&ids)
            .bind(&seats)
            .bind(schedule_id.as_uuid())
            .bind(request.price.cents())
            .bind(request.now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if sqlstate(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                    return schedule_missing(schedule_id);
                }
                db_error("create tickets", e)
            })?;

            Ok(result.rows_affected())
        })
        .await
    }

    async fn lock(&self, request: LockTicket) -> Result<Ticket, DomainError> {
        let ticket = with_timeout(self.op_timeout, "lock ticket", self.lock_in_tx(&request)).await?;
        tracing::debug!(
            ticket_id = %ticket.id(),
            user_id = %request.user_id,
            version = ticket.version(),
            "Ticket locked"
        );
        Ok(ticket)
    }

    async fn unlock(&self, request: UnlockTicket) -> Result<Ticket, DomainError> {
        let ticket =
            with_timeout(self.op_timeout, "unlock ticket", self.unlock_in_tx(&request)).await?;
        tracing::debug!(ticket_id = %ticket.id(), user_id = %request.user_id, "Ticket unlocked");
        Ok(ticket)
    }

    async fn unlock_all_expired(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<ExpiredLockSweep, DomainError> {
        let candidates: Vec<(Uuid, String)> = with_timeout(self.op_timeout, "find expired locks", async {
            sqlx::query_as(
                r#"
                SELECT l.ticket_id, l.user_id
                FROM ticket_locks l
                WHERE l.expires_at <= $1
                  AND NOT EXISTS (SELECT 1 FROM checkout_sessions s WHERE s.user_id = l.user_id)
                ORDER BY l.expires_at
                LIMIT $2
                "#,
            )
            .bind(now.as_datetime())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("find expired locks", e))
        })
        .await?;

        let mut sweep = ExpiredLockSweep::default();
        for (raw_id, raw_user) in candidates {
            let ticket_id = TicketId::from_uuid(raw_id);
            let released = with_timeout(
                self.op_timeout,
                "release expired lock",
                self.release_expired(ticket_id, now),
            )
            .await;
            match released {
                Ok(true) => sweep.released.push(ticket_id),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(%ticket_id, user_id = %raw_user, error = %err, "Failed to release expired lock");
                    sweep.failed.push((ticket_id, err.to_string()));
                }
            }
        }
        Ok(sweep)
    }
}

fn schedule_missing(id: ScheduleId) -> DomainError {
    DomainError::new(ErrorCode::ScheduleNotFound, "Schedule not found")
        .with_detail("schedule_id", id.to_string())
}
