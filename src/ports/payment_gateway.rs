//! Payment gateway port.
//!
//! The gateway is an opaque remote service: it hosts a checkout page for a
//! list of priced line items and later tells us, by webhook or on request,
//! whether the customer paid.
//!
//! # Design
//!
//! - **Gateway agnostic**: nothing here names a specific provider
//! - **Idempotent expiry**: expiring a session that is no longer open is `Ok`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::checkout::LineItem;
use crate::domain::foundation::{DomainError, ErrorCode, PaymentSessionId, Timestamp, UserId};
use crate::domain::reservation::ReservationError;

/// Port for the remote checkout provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted checkout session for the given items.
    async fn open_session(&self, request: OpenSessionRequest)
        -> Result<RemoteSession, PaymentError>;

    /// Fetches the provider's current view of a session.
    ///
    /// # Errors
    ///
    /// `PaymentErrorCode::NotFound` if the provider does not know the id.
    async fn get_session(&self, session_id: &PaymentSessionId)
        -> Result<RemoteSession, PaymentError>;

    /// Expires an open session so it can no longer be paid.
    ///
    /// Returns `Ok` when the session is already expired or complete.
    async fn expire_session(&self, session_id: &PaymentSessionId) -> Result<(), PaymentError>;

    /// Verifies a webhook signature and parses the event.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Request to open a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    /// Stored by the provider and echoed back in webhooks.
    pub user_id: UserId,
    pub line_items: Vec<LineItem>,
    /// ISO 4217, lowercase (e.g. "usd").
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub expires_at: Timestamp,
}

/// Provider-side lifecycle of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteSessionStatus {
    Open,
    Complete,
    Expired,
}

/// Whether money actually moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    /// True when tickets may be handed out.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::NoPaymentRequired)
    }
}

/// A checkout session as the provider sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub id: PaymentSessionId,
    /// Hosted page URL; absent once the session is closed.
    pub url: Option<String>,
    pub status: RemoteSessionStatus,
    pub payment_status: PaymentStatus,
    /// The user the session was opened for, if the provider echoed it back.
    pub user_id: Option<UserId>,
    pub expires_at: Option<Timestamp>,
}

impl RemoteSession {
    /// Completed and paid: tickets can be fulfilled.
    pub fn is_paid(&self) -> bool {
        self.status == RemoteSessionStatus::Complete && self.payment_status.is_settled()
    }
}

/// Webhook event from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: WebhookEventType,
    /// The session the event is about; `None` for unrelated event types.
    pub session: Option<RemoteSession>,
    /// Unix seconds.
    pub created_at: i64,
}

/// Types of webhook events we act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    CheckoutSessionAsyncPaymentSucceeded,
    CheckoutSessionAsyncPaymentFailed,
    CheckoutSessionExpired,
    Unknown(String),
}

impl WebhookEventType {
    /// Maps the provider's dotted event name.
    pub fn from_provider(name: &str) -> Self {
        match name {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "checkout.session.async_payment_succeeded" => {
                Self::CheckoutSessionAsyncPaymentSucceeded
            }
            "checkout.session.async_payment_failed" => Self::CheckoutSessionAsyncPaymentFailed,
            "checkout.session.expired" => Self::CheckoutSessionExpired,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_provider_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CheckoutSessionAsyncPaymentSucceeded => {
                "checkout.session.async_payment_succeeded"
            }
            Self::CheckoutSessionAsyncPaymentFailed => "checkout.session.async_payment_failed",
            Self::CheckoutSessionExpired => "checkout.session.expired",
            Self::Unknown(name) => name,
        }
    }
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
    /// Provider's own error code, if any.
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidRequest, message)
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::InvalidWebhook => ErrorCode::InvalidWebhook,
            _ => ErrorCode::PaymentProviderError,
        };

        let domain = DomainError::new(code, err.message)
            .with_detail("payment_error", err.code.to_string());
        match err.provider_code {
            Some(provider_code) => domain.with_detail("provider_code", provider_code),
            None => domain,
        }
    }
}

impl From<PaymentError> for ReservationError {
    fn from(err: PaymentError) -> Self {
        ReservationError::from(DomainError::from(err))
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    AuthenticationError,
    NotFound,
    RateLimitExceeded,
    InvalidRequest,
    InvalidWebhook,
    ProviderError,
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
