//! Mapping from reservation errors to HTTP responses.
//!
//! | Error | Status |
//! |-------|--------|
//! | ValidationFailed / InvalidWebhook | 400 |
//! | Unauthenticated | 401 |
//! | Forbidden / NotActivated | 403 |
//! | TicketNotFound / ScheduleNotFound / SessionNotFound | 404 |
//! | Conflict | 409 |
//! | Upstream / Timeout | 503 |
//! | Infrastructure | 500 |

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;
use crate::domain::reservation::ReservationError;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// API error type that converts reservation errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub ReservationError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ReservationError::ValidationFailed { .. } | ReservationError::InvalidWebhook(_) => {
                StatusCode::BAD_REQUEST
            }
            ReservationError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ReservationError::Forbidden(_) | ReservationError::NotActivated => {
                StatusCode::FORBIDDEN
            }
            ReservationError::TicketNotFound(_)
            | ReservationError::ScheduleNotFound(_)
            | ReservationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ReservationError::Conflict { .. } => StatusCode::CONFLICT,
            ReservationError::Upstream(_) | ReservationError::Timeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ReservationError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(ReservationError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code(), error = %self.0, "Request failed");
        }

        let mut body = ErrorResponse::new(self.0.code().to_string(), self.0.message());
        match &self.0 {
            ReservationError::ValidationFailed { field, .. } => {
                body = body.with_detail("field", field.clone());
            }
            ReservationError::Conflict { .. } | ReservationError::Timeout(_) => {
                body = body.with_detail("retryable", "true");
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ErrorCode, TicketId};

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ReservationError::validation("version", "negative"), StatusCode::BAD_REQUEST),
            (ReservationError::invalid_webhook("bad sig"), StatusCode::BAD_REQUEST),
            (ReservationError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ReservationError::NotActivated, StatusCode::FORBIDDEN),
            (ReservationError::forbidden("not yours"), StatusCode::FORBIDDEN),
            (ReservationError::ticket_not_found(TicketId::new()), StatusCode::NOT_FOUND),
            (ReservationError::checkout_in_progress(), StatusCode::CONFLICT),
            (ReservationError::upstream("stripe down"), StatusCode::SERVICE_UNAVAILABLE),
            (ReservationError::Timeout("lock".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ReservationError::infrastructure("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn conflict_response_uses_specific_code() {
        let response = ApiError(ReservationError::conflict(
            ErrorCode::VersionMismatch,
            "stale",
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
