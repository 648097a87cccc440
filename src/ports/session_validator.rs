//! Session validation port.
//!
//! HTTP middleware hands the raw Bearer token to this port and gets back the
//! caller's identity. Implementations exist for signed JWTs and for tests.
//!
//! # Contract
//!
//! Implementations must:
//! - verify the token signature
//! - verify issuer, audience and expiry
//! - return `AuthError::InvalidToken` for malformed or badly signed tokens
//! - return `AuthError::TokenExpired` for expired tokens
//! - return `AuthError::ServiceUnavailable` for transient failures

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validates a token (without the "Bearer " prefix) and returns the user.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
