//! Authentication types for the domain layer.
//!
//! An `AuthenticatedUser` is what the HTTP middleware injects into request
//! extensions after the `SessionValidator` port accepted a Bearer token.
//! Nothing here depends on a particular token format.

use super::UserId;
use thiserror::Error;

/// Authenticated caller extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    /// Set once the user confirmed their account; required to reserve seats.
    pub activated: bool,
}

impl AuthenticatedUser {
    pub fn new(
        id: UserId,
        email: impl Into<String>,
        display_name: Option<String>,
        activated: bool,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            display_name,
            activated,
        }
    }

    /// Returns the user's display name, or email as fallback.
    pub fn display_name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: Option<&str>) -> AuthenticatedUser {
        AuthenticatedUser::new(
            UserId::new("user-1").unwrap(),
            "patron@example.com",
            name.map(str::to_string),
            true,
        )
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(user(None).display_name_or_email(), "patron@example.com");
        assert_eq!(user(Some("Ada")).display_name_or_email(), "Ada");
    }

    #[test]
    fn only_service_unavailable_is_transient() {
        assert!(AuthError::service_unavailable("down").is_transient());
        assert!(!AuthError::TokenExpired.is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
    }
}
