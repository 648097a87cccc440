//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against Stripe Checkout: opening
//! hosted sessions for the buyer's locked tickets, reading and expiring them,
//! and verifying webhook deliveries.
//!
//! # Security
//!
//! - Webhook signatures are checked by `WebhookVerifier` (HMAC-SHA256, constant time)
//! - Old deliveries are rejected to stop replays
//! - Secrets are held as `secrecy::SecretString`

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::PaymentConfig;
use crate::domain::foundation::{PaymentSessionId, Timestamp};
use crate::domain::payment::WebhookVerifier;
use crate::ports::{
    OpenSessionRequest, PaymentError, PaymentErrorCode, PaymentGateway, RemoteSession,
    RemoteSessionStatus, WebhookEvent,
};

use super::webhook_types::{
    StripeCheckoutSession, StripeErrorResponse, StripeWebhookEvent, USER_ID_METADATA_KEY,
};

/// Placeholder Stripe substitutes with the session id on redirect.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    webhook_tolerance_secs: i64,

    request_timeout: Duration,

    /// Reject test mode events.
    require_livemode: bool,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            webhook_tolerance_secs: crate::domain::payment::DEFAULT_TOLERANCE_SECS,
            request_timeout: Duration::from_secs(10),
            require_livemode: false,
        }
    }

    /// Builds the adapter configuration from the application's payment section.
    pub fn from_payment_config(config: &PaymentConfig) -> Self {
        Self {
            api_key: config.stripe_api_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            webhook_tolerance_secs: config.webhook_tolerance_secs,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            require_livemode: config.is_live_mode(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe Checkout adapter.
pub struct StripeGatewayAdapter {
    config: StripeConfig,
    verifier: WebhookVerifier,
    http_client: reqwest::Client,
}

impl StripeGatewayAdapter {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaymentError::provider(format!("HTTP client setup failed: {}", e)))?;
        let verifier = WebhookVerifier::new(config.webhook_secret.clone())
            .with_tolerance_secs(config.webhook_tolerance_secs);

        Ok(Self {
            config,
            verifier,
            http_client,
        })
    }

    fn session_url(&self, session_id: &PaymentSessionId) -> String {
        format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url,
            session_id.as_str()
        )
    }

    async fn parse_session(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<RemoteSession, PaymentError> {
        if !response.status().is_success() {
            return Err(error_from_response(response, operation).await);
        }
        let session: StripeCheckoutSession = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;
        session.to_remote_session()
    }
}

/// Form parameters for `POST /v1/checkout/sessions`.
pub(crate) fn checkout_form(request: &OpenSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        (
            "cancel_url".to_string(),
            with_session_id_param(&request.cancel_url),
        ),
        (
            "client_reference_id".to_string(),
            request.user_id.to_string(),
        ),
        (
            format!("metadata[{}]", USER_ID_METADATA_KEY),
            request.user_id.to_string(),
        ),
        (
            "expires_at".to_string(),
            request.expires_at.as_unix_secs().to_string(),
        ),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        params.push((
            format!("{}[price_data][currency]", prefix),
            request.currency.clone(),
        ));
        params.push((
            format!("{}[price_data][unit_amount]", prefix),
            item.unit_amount.cents().to_string(),
        ));
        params.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.name.clone(),
        ));
        params.push((
            format!("{}[price_data][product_data][description]", prefix),
            item.description.clone(),
        ));
        params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }
    params
}

fn with_session_id_param(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}session_id={}", url, separator, SESSION_ID_PLACEHOLDER)
}

async fn error_from_response(response: reqwest::Response, operation: &str) -> PaymentError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<StripeErrorResponse>(&body).ok();
    let message = api_error
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| body.clone());

    tracing::error!(
        operation,
        status = status.as_u16(),
        error = %message,
        "Stripe API call failed"
    );

    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        400..=499 => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    };
    let error = PaymentError::new(code, format!("Stripe API error: {}", message));
    match api_error.and_then(|e| e.error.code) {
        Some(provider_code) => error.with_provider_code(provider_code),
        None => error,
    }
}

fn network_error(e: reqwest::Error) -> PaymentError {
    if e.is_timeout() {
        PaymentError::network(format!("Stripe request timed out: {}", e))
    } else {
        PaymentError::network(e.to_string())
    }
}

#[async_trait]
impl PaymentGateway for StripeGatewayAdapter {
    async fn open_session(
        &self,
        request: OpenSessionRequest,
    ) -> Result<RemoteSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let params = checkout_form(&request);
        let idempotency_key = format!(
            "checkout-{}-{}",
            request.user_id,
            request.expires_at.as_unix_secs()
        );

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .header("Idempotency-Key", idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(network_error)?;

        let session = self.parse_session(response, "open_session").await?;
        tracing::info!(
            session_id = %session.id,
            user_id = %request.user_id,
            items = request.line_items.len(),
            "Opened Stripe checkout session"
        );
        Ok(session)
    }

    async fn get_session(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<RemoteSession, PaymentError> {
        let response = self
            .http_client
            .get(self.session_url(session_id))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(network_error)?;

        self.parse_session(response, "get_session").await
    }

    async fn expire_session(&self, session_id: &PaymentSessionId) -> Result<(), PaymentError> {
        let url = format!("{}/expire", self.session_url(session_id));
        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(network_error)?;

        if response.status().is_success() {
            tracing::info!(session_id = %session_id, "Expired Stripe checkout session");
            return Ok(());
        }

        // Stripe refuses to expire a session that is no longer open.
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            let current = self.get_session(session_id).await?;
            if current.status != RemoteSessionStatus::Open {
                return Ok(());
            }
        }
        Err(error_from_response(response, "expire_session").await)
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.verifier
            .verify(payload, signature, Timestamp::now())
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected webhook signature");
                PaymentError::invalid_webhook(e.to_string())
            })?;

        let event = StripeWebhookEvent::parse(payload)?;
        if self.config.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Rejected test mode event in live mode");
            return Err(PaymentError::invalid_webhook(
                "Test mode events not allowed in live mode",
            ));
        }
        event.into_domain()
    }
}
