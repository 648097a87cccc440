//! Mock session validator for tests and local runs.
//!
//! Maps opaque tokens to users without any signature checks.
//!
//! ```ignore
//! let validator = MockSessionValidator::new()
//!     .with_test_user("alice-token", "alice")
//!     .with_inactive_user("bob-token", "bob");
//! ```

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Tokens not registered here are `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockSessionValidator {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
    force_error: RwLock<Option<AuthError>>,
}

impl MockSessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.add_token(token, user);
        self
    }

    /// Registers an activated user whose id is `user_id`.
    ///
    /// Blank ids are ignored.
    pub fn with_test_user(self, token: impl Into<String>, user_id: &str) -> Self {
        match test_user(user_id, true) {
            Some(user) => self.with_user(token, user),
            None => self,
        }
    }

    /// Registers a user who has not confirmed their account.
    pub fn with_inactive_user(self, token: impl Into<String>, user_id: &str) -> Self {
        match test_user(user_id, false) {
            Some(user) => self.with_user(token, user),
            None => self,
        }
    }

    /// Forces every validation to fail with `error`.
    pub fn with_error(self, error: AuthError) -> Self {
        *self.write_error() = Some(error);
        self
    }

    pub fn clear_error(&self) {
        *self.write_error() = None;
    }

    pub fn add_token(&self, token: impl Into<String>, user: AuthenticatedUser) {
        self.write_tokens().insert(token.into(), user);
    }

    pub fn remove_token(&self, token: &str) {
        self.write_tokens().remove(token);
    }

    fn read_tokens(&self) -> RwLockReadGuard<'_, HashMap<String, AuthenticatedUser>> {
        self.tokens.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_tokens(&self) -> RwLockWriteGuard<'_, HashMap<String, AuthenticatedUser>> {
        self.tokens.write().unwrap_or_else(|e| e.into_inner())
    }

    fn write_error(&self) -> RwLockWriteGuard<'_, Option<AuthError>> {
        self.force_error.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn test_user(user_id: &str, activated: bool) -> Option<AuthenticatedUser> {
    let id = UserId::new(user_id).ok()?;
    Some(AuthenticatedUser::new(
        id,
        format!("{}@test.example.com", user_id),
        Some(format!("Test User {}", user_id)),
        activated,
    ))
}

#[async_trait]
impl SessionValidator for MockSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let forced = self
            .force_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(error) = forced {
            return Err(error);
        }

        self.read_tokens()
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_returns_user() {
        let validator = MockSessionValidator::new().with_test_user("t1", "alice");
        let user = validator.validate("t1").await.unwrap();
        assert_eq!(user.id.as_str(), "alice");
        assert!(user.activated);
    }

    #[tokio::test]
    async fn inactive_user_is_not_activated() {
        let validator = MockSessionValidator::new().with_inactive_user("t2", "bob");
        assert!(!validator.validate("t2").await.unwrap().activated);
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let validator = MockSessionValidator::new();
        assert_eq!(validator.validate("nope").await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn forced_error_wins_until_cleared() {
        let validator = MockSessionValidator::new()
            .with_test_user("t1", "alice")
            .with_error(AuthError::service_unavailable("down"));
        assert!(validator.validate("t1").await.is_err());

        validator.clear_error();
        assert!(validator.validate("t1").await.is_ok());
    }

    #[tokio::test]
    async fn removed_token_stops_working() {
        let validator = MockSessionValidator::new().with_test_user("t1", "alice");
        validator.remove_token("t1");
        assert!(validator.validate("t1").await.is_err());
    }
}
