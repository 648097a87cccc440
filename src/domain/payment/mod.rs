//! Payment gateway vocabulary that does not depend on a specific provider.

mod signature;

pub use signature::{
    sign_payload, SignatureError, SignatureHeader, WebhookVerifier, DEFAULT_TOLERANCE_SECS,
    MAX_CLOCK_SKEW_SECS,
};
