//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Bearer token validation (HS256 JWT)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,

    /// Expected `iss` claim
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Expected `aud` claim
    #[serde(default = "default_audience")]
    pub audience: String,

    /// Clock leeway for `exp`/`nbf`, in seconds
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"));
        }
        if secret.len() < 32 {
            return Err(ValidationError::WeakJwtSecret);
        }
        if self.issuer.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_ISSUER"));
        }
        if self.audience.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_AUDIENCE"));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::new(String::new()),
            issuer: default_issuer(),
            audience: default_audience(),
            leeway_secs: default_leeway(),
        }
    }
}

fn default_issuer() -> String {
    "showtime-auth".to_string()
}

fn default_audience() -> String {
    "showtime".to_string()
}

fn default_leeway() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret() {
        assert_eq!(
            AuthConfig::default().validate(),
            Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"))
        );
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = AuthConfig {
            jwt_secret: SecretString::new("too-short".to_string()),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::WeakJwtSecret));
    }

    #[test]
    fn test_valid_config() {
        let config = AuthConfig {
            jwt_secret: SecretString::new("a".repeat(32)),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.leeway_secs, 30);
    }
}
