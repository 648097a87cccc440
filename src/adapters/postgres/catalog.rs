//! PostgreSQL implementation of CatalogReader.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::support::{db_error, parse_money, parse_user_id, with_timeout};
use crate::domain::foundation::{
    CinemaId, DomainError, HallId, MovieId, ScheduleId, SeatId, Timestamp,
};
use crate::ports::{CatalogReader, HallInfo, ScheduleInfo, SeatInfo};

pub struct PostgresCatalogReader {
    pool: PgPool,
    op_timeout: Duration,
}

impl PostgresCatalogReader {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    hall_id: Uuid,
    movie_id: Uuid,
    starts_at: DateTime<Utc>,
    price: i64,
}

impl TryFrom<ScheduleRow> for ScheduleInfo {
    type Error = DomainError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        Ok(ScheduleInfo {
            id: ScheduleId::from_uuid(row.id),
            hall_id: HallId::from_uuid(row.hall_id),
            movie_id: MovieId::from_uuid(row.movie_id),
            starts_at: Timestamp::from_datetime(row.starts_at),
            price: parse_money("schedule price", row.price)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HallRow {
    id: Uuid,
    cinema_id: Uuid,
    owner_id: String,
    seat_price: i64,
}

impl TryFrom<HallRow> for HallInfo {
    type Error = DomainError;

    fn try_from(row: HallRow) -> Result<Self, Self::Error> {
        Ok(HallInfo {
            id: HallId::from_uuid(row.id),
            cinema_id: CinemaId::from_uuid(row.cinema_id),
            owner_id: parse_user_id(row.owner_id)?,
            seat_price: parse_money("seat price", row.seat_price)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    hall_id: Uuid,
    row_number: i32,
    seat_number: i32,
}

impl From<SeatRow> for SeatInfo {
    fn from(row: SeatRow) -> Self {
        SeatInfo {
            id: SeatId::from_uuid(row.id),
            hall_id: HallId::from_uuid(row.hall_id),
            row: row.row_number,
            number: row.seat_number,
        }
    }
}

#[async_trait]
impl CatalogReader for PostgresCatalogReader {
    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<ScheduleInfo>, DomainError> {
        with_timeout(self.op_timeout, "get schedule", async {
            let row: Option<ScheduleRow> = sqlx::query_as(
                "SELECT id, hall_id, movie_id, starts_at, price FROM schedules WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("get schedule", e))?;

            row.map(ScheduleInfo::try_from).transpose()
        })
        .await
    }

    async fn get_hall(&self, id: HallId) -> Result<Option<HallInfo>, DomainError> {
        with_timeout(self.op_timeout, "get hall", async {
            let row: Option<HallRow> = sqlx::query_as(
                r#"
                SELECT h.id, h.cinema_id, c.owner_id, h.seat_price
                FROM halls h
                JOIN cinemas c ON c.id = h.cinema_id
                WHERE h.id = $1
                "#,
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("get hall", e))?;

            row.map(HallInfo::try_from).transpose()
        })
        .await
    }

    async fn seats_for_hall(&self, id: HallId) -> Result<Vec<SeatInfo>, DomainError> {
        with_timeout(self.op_timeout, "list seats", async {
            let rows: Vec<SeatRow> = sqlx::query_as(
                r#"
                SELECT id, hall_id, row_number, seat_number
                FROM seats
                WHERE hall_id = $1
                ORDER BY row_number, seat_number
                "#,
            )
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list seats", e))?;

            Ok(rows.into_iter().map(SeatInfo::from).collect())
        })
        .await
    }
}
