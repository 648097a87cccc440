//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl ValidationError {
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(from: impl fmt::Debug, to: impl fmt::Debug) -> Self {
        ValidationError::InvalidStateTransition {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }

    /// Name of the offending field, when the error is field-scoped.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => Some(field),
            ValidationError::InvalidStateTransition { .. } => None,
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    EmptyField,
    OutOfRange,
    InvalidFormat,

    // Not found errors
    TicketNotFound,
    ScheduleNotFound,
    CheckoutSessionNotFound,
    HallNotFound,

    // State errors
    InvalidStateTransition,
    Conflict,
    VersionMismatch,
    TicketUnavailable,
    ScheduleStarted,
    CheckoutInProgress,
    NoLockedTickets,

    // Authorization errors
    Unauthorized,
    Forbidden,
    NotActivated,

    // Payment errors
    PaymentProviderError,
    InvalidWebhook,

    // Infrastructure errors
    DatabaseError,
    Timeout,
    InternalError,
}

impl ErrorCode {
    /// True for codes that mean "re-read and retry" rather than "give up".
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ErrorCode::Conflict
                | ErrorCode::VersionMismatch
                | ErrorCode::TicketUnavailable
                | ErrorCode::ScheduleStarted
                | ErrorCode::CheckoutInProgress
                | ErrorCode::NoLockedTickets
                | ErrorCode::InvalidStateTransition
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorCode::TicketNotFound
                | ErrorCode::ScheduleNotFound
                | ErrorCode::CheckoutSessionNotFound
                | ErrorCode::HallNotFound
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::EmptyField => "EMPTY_FIELD",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::TicketNotFound => "TICKET_NOT_FOUND",
            ErrorCode::ScheduleNotFound => "SCHEDULE_NOT_FOUND",
            ErrorCode::CheckoutSessionNotFound => "CHECKOUT_SESSION_NOT_FOUND",
            ErrorCode::HallNotFound => "HALL_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::VersionMismatch => "VERSION_MISMATCH",
            ErrorCode::TicketUnavailable => "TICKET_UNAVAILABLE",
            ErrorCode::ScheduleStarted => "SCHEDULE_STARTED",
            ErrorCode::CheckoutInProgress => "CHECKOUT_IN_PROGRESS",
            ErrorCode::NoLockedTickets => "NO_LOCKED_TICKETS",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotActivated => "NOT_ACTIVATED",
            ErrorCode::PaymentProviderError => "PAYMENT_PROVIDER_ERROR",
            ErrorCode::InvalidWebhook => "INVALID_WEBHOOK",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::InvalidStateTransition { .. } => {
                DomainError::new(ErrorCode::InvalidStateTransition, err.to_string())
            }
            _ => {
                let field = err.field().unwrap_or("unknown").to_string();
                DomainError::validation(field, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("version", 0, i64::MAX, -1);
        assert_eq!(
            err.to_string(),
            format!("Field 'version' must be between 0 and {}, got -1", i64::MAX)
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::TicketNotFound, "Ticket not found");
        assert_eq!(err.to_string(), "[TICKET_NOT_FOUND] Ticket not found");
    }

    #[test]
    fn validation_conversion_keeps_field() {
        let err: DomainError = ValidationError::empty_field("session_id").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field"), Some(&"session_id".to_string()));
    }

    #[test]
    fn invalid_transition_converts_to_state_error() {
        let err: DomainError = ValidationError::invalid_transition("Sold", "Locked").into();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert!(err.code.is_conflict());
    }

    #[test]
    fn not_found_codes_are_not_conflicts() {
        for code in [ErrorCode::TicketNotFound, ErrorCode::ScheduleNotFound] {
            assert!(code.is_not_found());
            assert!(!code.is_conflict());
        }
    }
}
