//! Shared plumbing for the PostgreSQL adapters: deadlines, serializable
//! transactions and SQLSTATE mapping.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, Money, ScheduleId, SeatId, TicketId, Timestamp, UserId,
};
use crate::domain::ticket::{Ticket, TicketState};

/// serialization_failure
const SERIALIZATION_FAILURE: &str = "40001";
/// deadlock_detected
const DEADLOCK_DETECTED: &str = "40P01";
pub(crate) const UNIQUE_VIOLATION: &str = "23505";
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Runs `operation` under a deadline.
///
/// On expiry the future is dropped, which rolls back any open transaction.
pub(crate) async fn with_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation, timeout_ms = limit.as_millis() as u64, "Store operation timed out");
            Err(DomainError::new(
                ErrorCode::Timeout,
                format!("{} exceeded {:?}", operation, limit),
            ))
        }
    }
}

/// SQLSTATE of a database error, if any.
pub(crate) fn sqlstate(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Maps a driver error; serialization failures become retryable conflicts.
pub(crate) fn db_error(operation: &str, e: sqlx::Error) -> DomainError {
    match sqlstate(&e).as_deref() {
        Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => DomainError::conflict(format!(
            "Concurrent update during {}; retry",
            operation
        )),
        _ => DomainError::database(format!("Failed to {}: {}", operation, e)),
    }
}

pub(crate) async fn begin_serializable(
    pool: &PgPool,
) -> Result<Transaction<'static, Postgres>, DomainError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| db_error("begin transaction", e))?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("set isolation level", e))?;
    Ok(tx)
}

pub(crate) async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), DomainError> {
    tx.commit().await.map_err(|e| db_error("commit transaction", e))
}

/// Database row representation of a ticket.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TicketRow {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub seat_id: Uuid,
    pub price: i64,
    pub state: String,
    pub state_changed_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = DomainError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let state: TicketState = row.state.parse().map_err(|_| {
            DomainError::database(format!("Invalid ticket state value: {}", row.state))
        })?;
        let price = parse_money("ticket price", row.price)?;

        Ok(Ticket::reconstitute(
            TicketId::from_uuid(row.id),
            ScheduleId::from_uuid(row.schedule_id),
            SeatId::from_uuid(row.seat_id),
            price,
            state,
            Timestamp::from_datetime(row.state_changed_at),
            row.version,
        ))
    }
}

pub(crate) fn ticket_not_found(id: TicketId) -> DomainError {
    DomainError::new(ErrorCode::TicketNotFound, "Ticket not found")
        .with_detail("ticket_id", id.to_string())
}

pub(crate) fn checkout_in_progress(user_id: &UserId) -> DomainError {
    DomainError::new(
        ErrorCode::CheckoutInProgress,
        "A checkout is in progress; finish or let it expire first",
    )
    .with_detail("user_id", user_id.to_string())
}

pub(crate) fn parse_user_id(raw: String) -> Result<UserId, DomainError> {
    UserId::new(raw).map_err(|e| DomainError::database(format!("Invalid user id: {}", e)))
}

pub(crate) fn parse_money(field: &str, cents: i64) -> Result<Money, DomainError> {
    Money::from_cents(cents)
        .map_err(|e| DomainError::database(format!("Invalid {}: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str, price: i64) -> TicketRow {
        TicketRow {
            id: Uuid::new_v4(),
            schedule_id: Uuid::new_v4(),
            seat_id: Uuid::new_v4(),
            price,
            state: state.to_string(),
            state_changed_at: Utc::now(),
            version: 4,
        }
    }

    #[test]
    fn row_converts_to_ticket() {
        let ticket = Ticket::try_from(row("locked", 1200)).unwrap();
        assert_eq!(ticket.state(), TicketState::Locked);
        assert_eq!(ticket.price().cents(), 1200);
        assert_eq!(ticket.version(), 4);
    }

    #[test]
    fn unknown_state_is_a_database_error() {
        let err = Ticket::try_from(row("reserved", 1200)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn negative_price_is_a_database_error() {
        assert!(Ticket::try_from(row("sold", -5)).is_err());
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        let err = db_error("lock ticket", sqlx::Error::RowNotFound);
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(sqlstate(&sqlx::Error::PoolTimedOut).is_none());
    }

    #[tokio::test]
    async fn slow_operations_time_out() {
        let err = with_timeout(Duration::from_millis(10), "sleep", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, DomainError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn fast_operations_pass_through() {
        let value = with_timeout(Duration::from_secs(1), "noop", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
