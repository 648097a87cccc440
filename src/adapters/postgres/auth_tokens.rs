//! PostgreSQL implementation of AuthTokenStore.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::support::{db_error, with_timeout};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::AuthTokenStore;

pub struct PostgresAuthTokenStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl PostgresAuthTokenStore {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }
}

#[async_trait]
impl AuthTokenStore for PostgresAuthTokenStore {
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        with_timeout(self.op_timeout, "delete expired auth tokens", async {
            let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at < $1")
                .bind(now.as_datetime())
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("delete expired auth tokens", e))?;
            Ok(result.rows_affected())
        })
        .await
    }
}
