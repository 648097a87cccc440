//! Webhook signature verification.
//!
//! Payment gateway notifications carry a `t=<unix>,v1=<hex>` header. The
//! signature is HMAC-SHA256 over `"{t}.{raw body}"` keyed with the endpoint
//! secret. Old timestamps are rejected to stop replays.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::foundation::Timestamp;

/// Default maximum age of a signed payload (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum clock skew accepted for timestamps in the future (1 minute).
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Malformed signature header: {0}")]
    Malformed(String),

    #[error("Signature does not match payload")]
    Mismatch,

    #[error("Signature timestamp is too old")]
    Expired,

    #[error("Signature timestamp is in the future")]
    FromFuture,
}

/// Parsed components of the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Every `v1` entry; more than one is sent while secrets rotate.
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| SignatureError::Malformed("expected key=value".into()))?;

            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| SignatureError::Malformed("invalid timestamp".into()))?,
                    );
                }
                "v1" => signatures.push(
                    hex::decode(value)
                        .map_err(|_| SignatureError::Malformed("invalid v1 hex".into()))?,
                ),
                // v0 and future schemes are ignored
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| SignatureError::Malformed("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(SignatureError::Malformed("missing v1 signature".into()));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies signed webhook payloads against one endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance_secs(mut self, secs: i64) -> Self {
        self.tolerance_secs = secs;
        self
    }

    /// Checks the header against the raw body as of `now`.
    pub fn verify(
        &self,
        payload: &[u8],
        header: &str,
        now: Timestamp,
    ) -> Result<(), SignatureError> {
        let header = SignatureHeader::parse(header)?;

        let age = now.as_unix_secs() - header.timestamp;
        if age > self.tolerance_secs {
            return Err(SignatureError::Expired);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(SignatureError::FromFuture);
        }

        let expected = mac(self.secret.expose_secret().as_bytes(), header.timestamp, payload)?;
        let matched = header
            .signatures
            .iter()
            .any(|candidate| constant_time_eq(&expected, candidate));

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Produces a header value for `payload`, as the gateway would.
///
/// Used by the mock gateway and tests to fabricate deliveries.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    match mac(secret.as_bytes(), timestamp, payload) {
        Ok(sig) => format!("t={},v1={}", timestamp, hex::encode(sig)),
        Err(_) => format!("t={},v1=", timestamp),
    }
}

fn mac(key: &[u8], timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|_| SignatureError::Malformed("unusable secret".into()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret_12345";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::new(SECRET.to_string()))
    }

    #[test]
    fn parse_collects_all_v1_signatures() {
        let header = format!("t=1700000000,v1={},v1={},v0=ignored", "a".repeat(64), "b".repeat(64));
        let parsed = SignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.timestamp, 1_700_000_000);
        assert_eq!(parsed.signatures.len(), 2);
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(matches!(
            SignatureHeader::parse("t=1700000000"),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            SignatureHeader::parse(&format!("v1={}", "a".repeat(64))),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("garbage"),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=1,v1=zz"),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn accepts_freshly_signed_payload() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs(), BODY);
        assert_eq!(verifier().verify(BODY, &header, now), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs(), BODY);
        let tampered = br#"{"id":"evt_1","type":"checkout.session.expired"}"#;
        assert_eq!(
            verifier().verify(tampered, &header, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Timestamp::now();
        let header = sign_payload("whsec_other", now.as_unix_secs(), BODY);
        assert_eq!(
            verifier().verify(BODY, &header, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_and_future_timestamps() {
        let now = Timestamp::now();
        let stale = sign_payload(SECRET, now.as_unix_secs() - 301, BODY);
        let future = sign_payload(SECRET, now.as_unix_secs() + 61, BODY);
        assert_eq!(verifier().verify(BODY, &stale, now), Err(SignatureError::Expired));
        assert_eq!(
            verifier().verify(BODY, &future, now),
            Err(SignatureError::FromFuture)
        );
    }

    #[test]
    fn tolerance_is_configurable() {
        let now = Timestamp::now();
        let header = sign_payload(SECRET, now.as_unix_secs() - 600, BODY);
        assert!(verifier()
            .with_tolerance_secs(900)
            .verify(BODY, &header, now)
            .is_ok());
    }

    #[test]
    fn debug_output_hides_secret() {
        assert!(!format!("{:?}", verifier()).contains(SECRET));
    }
}
