//! Auth token store port.
//!
//! Activation, password-reset and similar one-time tokens are issued by the
//! authentication collaborator; the reservation service only purges them.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

#[async_trait]
pub trait AuthTokenStore: Send + Sync {
    /// Deletes every token whose expiry is before `now`. Returns how many.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError>;
}
