//! Stripe-specific types for checkout sessions and webhooks.
//!
//! These mirror the JSON Stripe sends, both as API responses and inside
//! webhook event envelopes, and map onto the gateway port's types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentSessionId, Timestamp, UserId};
use crate::ports::{
    PaymentError, PaymentStatus, RemoteSession, RemoteSessionStatus, WebhookEvent,
    WebhookEventType,
};

/// Metadata key carrying the buyer's user id.
pub const USER_ID_METADATA_KEY: &str = "user_id";

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Dotted event type, e.g. "checkout.session.completed".
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,
}

impl StripeWebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::invalid_webhook(format!("Malformed event: {}", e)))
    }

    /// Converts into the port's event type.
    ///
    /// Checkout events must carry a checkout session object; other event
    /// types keep whatever they carry out of the mapping.
    pub fn into_domain(self) -> Result<WebhookEvent, PaymentError> {
        let event_type = WebhookEventType::from_provider(&self.event_type);

        let session = match event_type {
            WebhookEventType::Unknown(_) => None,
            _ => {
                let session: StripeCheckoutSession = serde_json::from_value(self.data.object)
                    .map_err(|e| {
                        PaymentError::invalid_webhook(format!("Malformed checkout session: {}", e))
                    })?;
                Some(session.to_remote_session()?)
            }
        };

        Ok(WebhookEvent {
            id: self.id,
            event_type,
            session,
            created_at: self.created,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout Session
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    #[serde(default)]
    pub object: String,

    /// Hosted page URL; null once the session is closed.
    pub url: Option<String>,

    /// open, complete or expired.
    pub status: String,

    /// paid, unpaid or no_payment_required.
    pub payment_status: String,

    /// We set this to the buyer's user id.
    pub client_reference_id: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    pub expires_at: Option<i64>,

    pub amount_total: Option<i64>,

    pub currency: Option<String>,
}

impl StripeCheckoutSession {
    /// The buyer, from `client_reference_id` or metadata.
    pub fn user_id(&self) -> Option<UserId> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get(USER_ID_METADATA_KEY).map(String::as_str))
            .and_then(|id| UserId::new(id).ok())
    }

    pub fn to_remote_session(&self) -> Result<RemoteSession, PaymentError> {
        let id = PaymentSessionId::new(self.id.clone())
            .map_err(|e| PaymentError::invalid_request(e.to_string()))?;

        Ok(RemoteSession {
            id,
            url: self.url.clone(),
            status: parse_status(&self.status)?,
            payment_status: parse_payment_status(&self.payment_status)?,
            user_id: self.user_id(),
            expires_at: self.expires_at.and_then(Timestamp::from_unix_secs),
        })
    }
}

fn parse_status(value: &str) -> Result<RemoteSessionStatus, PaymentError> {
    match value {
        "open" => Ok(RemoteSessionStatus::Open),
        "complete" => Ok(RemoteSessionStatus::Complete),
        "expired" => Ok(RemoteSessionStatus::Expired),
        other => Err(PaymentError::provider(format!(
            "Unknown checkout session status: {}",
            other
        ))),
    }
}

fn parse_payment_status(value: &str) -> Result<PaymentStatus, PaymentError> {
    match value {
        "paid" => Ok(PaymentStatus::Paid),
        "unpaid" => Ok(PaymentStatus::Unpaid),
        "no_payment_required" => Ok(PaymentStatus::NoPaymentRequired),
        other => Err(PaymentError::provider(format!(
            "Unknown payment status: {}",
            other
        ))),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// API Errors
// ════════════════════════════════════════════════════════════════════════════════

/// Error body returned by the Stripe API.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}
