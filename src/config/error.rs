//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid log format (expected 'pretty' or 'json')")]
    InvalidLogFormat,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("Invalid redirect URL: {0}")]
    InvalidRedirectUrl(&'static str),

    #[error("Invalid currency code")]
    InvalidCurrency,

    #[error("Checkout session window must be between 30 minutes and 24 hours")]
    InvalidSessionWindow,

    #[error("Lock window must be positive and shorter than 24 hours")]
    InvalidLockWindow,

    #[error("Reconciler interval must be positive")]
    InvalidInterval,

    #[error("Batch size must be between 1 and 1000")]
    InvalidBatchSize,

    #[error("Async payment grace must be between 1 hour and 30 days")]
    InvalidPaymentGrace,

    #[error("JWT secret must be at least 32 bytes")]
    WeakJwtSecret,
}
