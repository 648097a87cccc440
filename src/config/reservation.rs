//! Reservation timing configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MIN_SESSION_WINDOW_SECS: u64 = 30 * 60;
const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;
const MIN_GRACE_SECS: u64 = 60 * 60;
const MAX_GRACE_SECS: u64 = 30 * 24 * 60 * 60;

/// Lock and checkout windows plus reconciler cadence
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    /// How long a ticket stays locked without a checkout
    #[serde(default = "default_lock_window")]
    pub lock_window_secs: u64,

    /// Lifetime of a checkout session; the gateway refuses less than 30 minutes
    #[serde(default = "default_session_window")]
    pub session_window_secs: u64,

    /// How long past the session window a completed checkout may wait for an
    /// asynchronous payment result before it is abandoned
    #[serde(default = "default_payment_grace")]
    pub async_payment_grace_secs: u64,

    #[serde(default = "default_tick")]
    pub lock_expiry_interval_secs: u64,

    #[serde(default = "default_tick")]
    pub session_expiry_interval_secs: u64,

    #[serde(default = "default_token_tick")]
    pub token_expiry_interval_secs: u64,

    /// Checkout sessions examined per reconciler tick
    #[serde(default = "default_session_batch")]
    pub session_batch_size: u32,

    /// Expired locks released per reconciler tick
    #[serde(default = "default_lock_batch")]
    pub lock_batch_size: u32,
}

impl ReservationConfig {
    pub fn lock_window(&self) -> Duration {
        Duration::from_secs(self.lock_window_secs)
    }

    pub fn session_window(&self) -> Duration {
        Duration::from_secs(self.session_window_secs)
    }

    pub fn async_payment_grace(&self) -> Duration {
        Duration::from_secs(self.async_payment_grace_secs)
    }

    pub fn lock_expiry_interval(&self) -> Duration {
        Duration::from_secs(self.lock_expiry_interval_secs)
    }

    pub fn session_expiry_interval(&self) -> Duration {
        Duration::from_secs(self.session_expiry_interval_secs)
    }

    pub fn token_expiry_interval(&self) -> Duration {
        Duration::from_secs(self.token_expiry_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lock_window_secs == 0 || self.lock_window_secs > MAX_WINDOW_SECS {
            return Err(ValidationError::InvalidLockWindow);
        }
        if !(MIN_SESSION_WINDOW_SECS..=MAX_WINDOW_SECS).contains(&self.session_window_secs) {
            return Err(ValidationError::InvalidSessionWindow);
        }
        if !(MIN_GRACE_SECS..=MAX_GRACE_SECS).contains(&self.async_payment_grace_secs) {
            return Err(ValidationError::InvalidPaymentGrace);
        }
        if [
            self.lock_expiry_interval_secs,
            self.session_expiry_interval_secs,
            self.token_expiry_interval_secs,
        ]
        .contains(&0)
        {
            return Err(ValidationError::InvalidInterval);
        }
        for batch in [self.session_batch_size, self.lock_batch_size] {
            if batch == 0 || batch > 1000 {
                return Err(ValidationError::InvalidBatchSize);
            }
        }
        Ok(())
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            lock_window_secs: default_lock_window(),
            session_window_secs: default_session_window(),
            async_payment_grace_secs: default_payment_grace(),
            lock_expiry_interval_secs: default_tick(),
            session_expiry_interval_secs: default_tick(),
            token_expiry_interval_secs: default_token_tick(),
            session_batch_size: default_session_batch(),
            lock_batch_size: default_lock_batch(),
        }
    }
}

fn default_lock_window() -> u64 {
    15 * 60
}

fn default_session_window() -> u64 {
    MIN_SESSION_WINDOW_SECS
}

fn default_payment_grace() -> u64 {
    3 * 24 * 60 * 60
}

fn default_tick() -> u64 {
    60
}

fn default_token_tick() -> u64 {
    60 * 60
}

fn default_session_batch() -> u32 {
    100
}

fn default_lock_batch() -> u32 {
    500
}
