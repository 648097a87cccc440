//! Reservation-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | TicketNotFound / ScheduleNotFound / SessionNotFound | 404 |
//! | Conflict | 409 |
//! | Unauthenticated | 401 |
//! | Forbidden / NotActivated | 403 |
//! | ValidationFailed / InvalidWebhook | 400 |
//! | Upstream / Timeout | 503 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, ScheduleId, TicketId};

/// Errors surfaced by reservation use cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    TicketNotFound(TicketId),

    ScheduleNotFound(ScheduleId),

    /// No checkout session for the given user or gateway id.
    SessionNotFound(String),

    /// A state-machine guard failed. Safe to retry after re-reading.
    Conflict { code: ErrorCode, reason: String },

    /// No authenticated caller.
    Unauthenticated,

    /// Caller exists but has not activated their account.
    NotActivated,

    /// Caller is authenticated but has no rights over the resource.
    Forbidden(String),

    ValidationFailed { field: String, message: String },

    /// Webhook payload was unsigned, badly signed or malformed.
    InvalidWebhook(String),

    /// Payment gateway unreachable or refused the call.
    Upstream(String),

    /// A store operation exceeded its deadline.
    Timeout(String),

    Infrastructure(String),
}

impl ReservationError {
    pub fn ticket_not_found(id: TicketId) -> Self {
        ReservationError::TicketNotFound(id)
    }

    pub fn schedule_not_found(id: ScheduleId) -> Self {
        ReservationError::ScheduleNotFound(id)
    }

    pub fn session_not_found(key: impl Into<String>) -> Self {
        ReservationError::SessionNotFound(key.into())
    }

    pub fn conflict(code: ErrorCode, reason: impl Into<String>) -> Self {
        ReservationError::Conflict {
            code,
            reason: reason.into(),
        }
    }

    pub fn schedule_started(id: ScheduleId) -> Self {
        Self::conflict(
            ErrorCode::ScheduleStarted,
            format!("Schedule {} has already started", id),
        )
    }

    pub fn checkout_in_progress() -> Self {
        Self::conflict(
            ErrorCode::CheckoutInProgress,
            "A checkout is in progress; finish or let it expire first",
        )
    }

    pub fn no_locked_tickets() -> Self {
        Self::conflict(ErrorCode::NoLockedTickets, "No locked tickets to check out")
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        ReservationError::Forbidden(reason.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ReservationError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_webhook(reason: impl Into<String>) -> Self {
        ReservationError::InvalidWebhook(reason.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ReservationError::Upstream(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        ReservationError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ReservationError::TicketNotFound(_) => ErrorCode::TicketNotFound,
            ReservationError::ScheduleNotFound(_) => ErrorCode::ScheduleNotFound,
            ReservationError::SessionNotFound(_) => ErrorCode::CheckoutSessionNotFound,
            ReservationError::Conflict { code, .. } => *code,
            ReservationError::Unauthenticated => ErrorCode::Unauthorized,
            ReservationError::NotActivated => ErrorCode::NotActivated,
            ReservationError::Forbidden(_) => ErrorCode::Forbidden,
            ReservationError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            ReservationError::InvalidWebhook(_) => ErrorCode::InvalidWebhook,
            ReservationError::Upstream(_) => ErrorCode::PaymentProviderError,
            ReservationError::Timeout(_) => ErrorCode::Timeout,
            ReservationError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReservationError::TicketNotFound(id) => format!("Ticket not found: {}", id),
            ReservationError::ScheduleNotFound(id) => format!("Schedule not found: {}", id),
            ReservationError::SessionNotFound(key) => {
                format!("Checkout session not found: {}", key)
            }
            ReservationError::Conflict { reason, .. } => reason.clone(),
            ReservationError::Unauthenticated => "Authentication required".to_string(),
            ReservationError::NotActivated => "Account is not activated".to_string(),
            ReservationError::Forbidden(reason) => reason.clone(),
            ReservationError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            ReservationError::InvalidWebhook(reason) => {
                format!("Invalid webhook: {}", reason)
            }
            ReservationError::Upstream(msg) => format!("Payment provider error: {}", msg),
            ReservationError::Timeout(msg) => format!("Operation timed out: {}", msg),
            ReservationError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReservationError::Conflict { .. })
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReservationError::Conflict { .. }
                | ReservationError::Upstream(_)
                | ReservationError::Timeout(_)
                | ReservationError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for ReservationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ReservationError {}

impl From<DomainError> for ReservationError {
    fn from(err: DomainError) -> Self {
        let detail = |key: &str| err.details.get(key).cloned();

        match err.code {
            code if code.is_conflict() => ReservationError::Conflict {
                code,
                reason: err.message,
            },
            ErrorCode::TicketNotFound => match detail("ticket_id").and_then(|s| s.parse().ok()) {
                Some(id) => ReservationError::TicketNotFound(id),
                None => ReservationError::Infrastructure(err.to_string()),
            },
            ErrorCode::ScheduleNotFound => {
                match detail("schedule_id").and_then(|s| s.parse().ok()) {
                    Some(id) => ReservationError::ScheduleNotFound(id),
                    None => ReservationError::Infrastructure(err.to_string()),
                }
            }
            ErrorCode::CheckoutSessionNotFound => {
                ReservationError::SessionNotFound(detail("session_id").unwrap_or(err.message))
            }
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => ReservationError::ValidationFailed {
                field: detail("field").unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::Unauthorized => ReservationError::Unauthenticated,
            ErrorCode::NotActivated => ReservationError::NotActivated,
            ErrorCode::Forbidden => ReservationError::Forbidden(err.message),
            ErrorCode::InvalidWebhook => ReservationError::InvalidWebhook(err.message),
            ErrorCode::PaymentProviderError => ReservationError::Upstream(err.message),
            ErrorCode::Timeout => ReservationError::Timeout(err.message),
            _ => ReservationError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ReservationError> for DomainError {
    fn from(err: ReservationError) -> Self {
        let base = DomainError::new(err.code(), err.message());
        match err {
            ReservationError::ValidationFailed { field, .. } => base.with_detail("field", field),
            ReservationError::TicketNotFound(id) => base.with_detail("ticket_id", id.to_string()),
            ReservationError::ScheduleNotFound(id) => {
                base.with_detail("schedule_id", id.to_string())
            }
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_keeps_specific_code() {
        let err = ReservationError::checkout_in_progress();
        assert_eq!(err.code(), ErrorCode::CheckoutInProgress);
        assert!(err.is_conflict());
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_round_trips_through_domain_error() {
        let id = TicketId::new();
        let domain: DomainError = ReservationError::ticket_not_found(id).into();
        assert_eq!(domain.code, ErrorCode::TicketNotFound);
        assert_eq!(ReservationError::from(domain), ReservationError::TicketNotFound(id));
    }

    #[test]
    fn version_mismatch_maps_to_conflict() {
        let domain = DomainError::new(ErrorCode::VersionMismatch, "stale");
        let err = ReservationError::from(domain);
        assert_eq!(
            err,
            ReservationError::Conflict {
                code: ErrorCode::VersionMismatch,
                reason: "stale".into()
            }
        );
    }

    #[test]
    fn validation_keeps_field() {
        let domain = DomainError::validation("version", "must be >= 0");
        match ReservationError::from(domain) {
            ReservationError::ValidationFailed { field, .. } => assert_eq!(field, "version"),
            other => panic!("Expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn database_errors_become_infrastructure() {
        let err = ReservationError::from(DomainError::database("connection reset"));
        assert!(matches!(err, ReservationError::Infrastructure(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn timeouts_and_gateway_failures_are_distinct() {
        let timeout = ReservationError::from(DomainError::new(ErrorCode::Timeout, "lock"));
        let upstream =
            ReservationError::from(DomainError::new(ErrorCode::PaymentProviderError, "502"));
        assert_eq!(timeout.code(), ErrorCode::Timeout);
        assert_eq!(upstream.code(), ErrorCode::PaymentProviderError);
    }

    #[test]
    fn authorization_errors_are_not_retryable() {
        assert!(!ReservationError::forbidden("not yours").is_retryable());
        assert!(!ReservationError::Unauthenticated.is_retryable());
        assert!(!ReservationError::NotActivated.is_retryable());
    }
}
