//! Mock payment gateway for testing.
//!
//! Provides a configurable implementation of `PaymentGateway` for unit and
//! integration tests. Supports:
//! - Remote session state that tests can move (pay, expire, forget)
//! - Error injection per method
//! - Call tracking
//! - Signed webhook deliveries in Stripe's wire format

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;

use crate::domain::foundation::{PaymentSessionId, Timestamp};
use crate::domain::payment::{sign_payload, WebhookVerifier};
use crate::ports::{
    OpenSessionRequest, PaymentError, PaymentGateway, PaymentStatus, RemoteSession,
    RemoteSessionStatus, WebhookEvent, WebhookEventType,
};

use super::webhook_types::StripeWebhookEvent;

/// Endpoint secret the mock signs and verifies deliveries with.
pub const MOCK_WEBHOOK_SECRET: &str = "whsec_mock_secret";

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, RemoteSession>,
    opened: Vec<OpenSessionRequest>,
    method_errors: HashMap<String, PaymentError>,
    call_log: Vec<MethodCall>,
    next_id: u64,
}

/// In-process stand-in for the hosted checkout provider.
///
/// Cloning shares state, so a test can keep a handle while the application
/// owns another.
#[derive(Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
    verifier: WebhookVerifier,
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            verifier: WebhookVerifier::new(SecretString::new(MOCK_WEBHOOK_SECRET.to_string())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration
    // ════════════════════════════════════════════════════════════════════════════

    /// Makes every call to `method` fail until cleared.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    /// Moves a remote session to the given state, as if the customer acted.
    pub fn set_remote_state(
        &self,
        session_id: &PaymentSessionId,
        status: RemoteSessionStatus,
        payment_status: PaymentStatus,
    ) {
        if let Some(session) = self.state().sessions.get_mut(session_id.as_str()) {
            session.status = status;
            session.payment_status = payment_status;
            if status != RemoteSessionStatus::Open {
                session.url = None;
            }
        }
    }

    /// Customer paid on the hosted page.
    pub fn pay(&self, session_id: &PaymentSessionId) {
        self.set_remote_state(session_id, RemoteSessionStatus::Complete, PaymentStatus::Paid);
    }

    /// Provider forgets the session; lookups return `NotFound`.
    pub fn forget(&self, session_id: &PaymentSessionId) {
        self.state().sessions.remove(session_id.as_str());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Requests passed to `open_session`, oldest first.
    pub fn opened_requests(&self) -> Vec<OpenSessionRequest> {
        self.state().opened.clone()
    }

    pub fn remote_session(&self, session_id: &PaymentSessionId) -> Option<RemoteSession> {
        self.state().sessions.get(session_id.as_str()).cloned()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Webhook Simulation
    // ════════════════════════════════════════════════════════════════════════════

    /// Builds a signed delivery about a known session, returning body and
    /// signature header.
    pub fn webhook_delivery(
        &self,
        event_type: &WebhookEventType,
        session_id: &PaymentSessionId,
    ) -> Option<(Vec<u8>, String)> {
        let session = self.remote_session(session_id)?;
        let object = json!({
            "id": session.id.as_str(),
            "object": "checkout.session",
            "url": session.url,
            "status": session.status,
            "payment_status": session.payment_status,
            "client_reference_id": session.user_id.as_ref().map(|u| u.as_str().to_string()),
            "metadata": {},
            "expires_at": session.expires_at.map(|t| t.as_unix_secs()),
        });
        let payload = self.event_payload(event_type.as_provider_str(), object);
        let header = Self::sign(&payload);
        Some((payload, header))
    }

    /// Serializes an event envelope around an arbitrary object.
    pub fn event_payload(&self, event_type: &str, object: serde_json::Value) -> Vec<u8> {
        let id = {
            let mut state = self.state();
            state.next_id += 1;
            format!("evt_mock_{}", state.next_id)
        };
        let envelope = json!({
            "id": id,
            "type": event_type,
            "created": Timestamp::now().as_unix_secs(),
            "data": { "object": object },
            "livemode": false,
        });
        serde_json::to_vec(&envelope).unwrap_or_default()
    }

    /// Signature header for `payload` signed now with the mock secret.
    pub fn sign(payload: &[u8]) -> String {
        sign_payload(MOCK_WEBHOOK_SECRET, Timestamp::now().as_unix_secs(), payload)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) -> Result<(), PaymentError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        match state.method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn open_session(
        &self,
        request: OpenSessionRequest,
    ) -> Result<RemoteSession, PaymentError> {
        self.record_call(
            "open_session",
            vec![
                request.user_id.to_string(),
                request.line_items.len().to_string(),
            ],
        )?;

        let mut state = self.state();
        state.next_id += 1;
        let raw_id = format!("cs_mock_{}", state.next_id);
        let id = PaymentSessionId::new(raw_id.clone())
            .map_err(|e| PaymentError::invalid_request(e.to_string()))?;

        let session = RemoteSession {
            url: Some(format!("https://checkout.mock.test/pay/{}", raw_id)),
            id,
            status: RemoteSessionStatus::Open,
            payment_status: PaymentStatus::Unpaid,
            user_id: Some(request.user_id.clone()),
            expires_at: Some(request.expires_at),
        };
        state.sessions.insert(raw_id, session.clone());
        state.opened.push(request);
        Ok(session)
    }

    async fn get_session(
        &self,
        session_id: &PaymentSessionId,
    ) -> Result<RemoteSession, PaymentError> {
        self.record_call("get_session", vec![session_id.to_string()])?;
        self.remote_session(session_id)
            .ok_or_else(|| PaymentError::not_found("Checkout session"))
    }

    async fn expire_session(&self, session_id: &PaymentSessionId) -> Result<(), PaymentError> {
        self.record_call("expire_session", vec![session_id.to_string()])?;
        let mut state = self.state();
        let session = state
            .sessions
            .get_mut(session_id.as_str())
            .ok_or_else(|| PaymentError::not_found("Checkout session"))?;
        if session.status == RemoteSessionStatus::Open {
            session.status = RemoteSessionStatus::Expired;
            session.url = None;
        }
        Ok(())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.record_call("verify_webhook", vec![signature.to_string()])?;
        self.verifier
            .verify(payload, signature, Timestamp::now())
            .map_err(|e| PaymentError::invalid_webhook(e.to_string()))?;
        StripeWebhookEvent::parse(payload)?.into_domain()
    }
}
