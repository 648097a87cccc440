//! PostgreSQL implementation of TicketReader.
//!
//! Plain reads outside any transaction; the write side re-reads before it
//! decides anything.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::support::{db_error, with_timeout, TicketRow};
use crate::domain::checkout::LockedTicket;
use crate::domain::foundation::{DomainError, ScheduleId, SeatId, Timestamp, UserId};
use crate::domain::ticket::Ticket;
use crate::ports::{TicketReader, TicketSeat};

pub struct PostgresTicketReader {
    pool: PgPool,
    op_timeout: Duration,
}

impl PostgresTicketReader {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketSeatRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    row_number: i32,
    seat_number: i32,
}

impl TryFrom<TicketSeatRow> for TicketSeat {
    type Error = DomainError;

    fn try_from(row: TicketSeatRow) -> Result<Self, Self::Error> {
        let seat_id = SeatId::from_uuid(row.ticket.seat_id);
        Ok(TicketSeat {
            ticket: Ticket::try_from(row.ticket)?,
            seat_id,
            row: row.row_number,
            number: row.seat_number,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LockedTicketRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    lock_expires_at: DateTime<Utc>,
    movie_title: String,
    cinema_name: String,
    hall_name: String,
    row_number: i32,
    seat_number: i32,
    starts_at: DateTime<Utc>,
}

impl TryFrom<LockedTicketRow> for LockedTicket {
    type Error = DomainError;

    fn try_from(row: LockedTicketRow) -> Result<Self, Self::Error> {
        Ok(LockedTicket {
            ticket: Ticket::try_from(row.ticket)?,
            lock_expires_at: Timestamp::from_datetime(row.lock_expires_at),
            movie_title: row.movie_title,
            cinema_name: row.cinema_name,
            hall_name: row.hall_name,
            seat_row: row.row_number,
            seat_number: row.seat_number,
            starts_at: Timestamp::from_datetime(row.starts_at),
        })
    }
}

#[async_trait]
impl TicketReader for PostgresTicketReader {
    async fn list_for_schedule(
        &self,
        schedule_id: ScheduleId,
    ) -> Result<Vec<TicketSeat>, DomainError> {
        with_timeout(self.op_timeout, "list tickets", async {
            let rows: Vec<TicketSeatRow> = sqlx::query_as(
                r#"
                SELECT t.id, t.schedule_id, t.seat_id, t.price, t.state, t.state_changed_at,
                       t.version, s.row_number, s.seat_number
                FROM tickets t
                JOIN seats s ON s.id = t.seat_id
                WHERE t.schedule_id = $1
                ORDER BY s.row_number, s.seat_number
                "#,
            )
            .bind(schedule_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list tickets", e))?;

            rows.into_iter().map(TicketSeat::try_from).collect()
        })
        .await
    }

    async fn find_locked_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LockedTicket>, DomainError> {
        with_timeout(self.op_timeout, "find locked tickets", async {
            let rows: Vec<LockedTicketRow> = sqlx::query_as(
                r#"
                SELECT t.id, t.schedule_id, t.seat_id, t.price, t.state, t.state_changed_at,
                       t.version,
                       l.expires_at AS lock_expires_at,
                       m.title AS movie_title,
                       c.name AS cinema_name,
                       h.name AS hall_name,
                       s.row_number, s.seat_number,
                       sc.starts_at
                FROM ticket_locks l
                JOIN tickets t ON t.id = l.ticket_id
                JOIN seats s ON s.id = t.seat_id
                JOIN schedules sc ON sc.id = t.schedule_id
                JOIN halls h ON h.id = sc.hall_id
                JOIN cinemas c ON c.id = h.cinema_id
                JOIN movies m ON m.id = sc.movie_id
                WHERE l.user_id = $1
                ORDER BY sc.starts_at, s.row_number, s.seat_number
                "#,
            )
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("find locked tickets", e))?;

            rows.into_iter().map(LockedTicket::try_from).collect()
        })
        .await
    }
}
