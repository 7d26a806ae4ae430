//! Environment-driven service configuration.
//!
//! Provider credentials are optional: leaving a secret unset disables that
//! provider's endpoints, which then fail closed with a configuration error.
//! When a provider's secret is present, its remaining settings become
//! required so a half-configured provider is caught at startup instead of at
//! the first settlement.

use std::env;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("missing required environment variable: {name}")]
    Missing {
        /// Variable name.
        name: &'static str,
    },
}

impl ConfigError {
    const fn missing(name: &'static str) -> Self {
        Self::Missing { name }
    }
}

/// Card-checkout provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSettings {
    /// API secret key for session creation.
    pub secret_key: String,
    /// Base URL of the provider API.
    pub api_base: String,
}

/// Regional-gateway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Publishable key id, also echoed to clients in order responses.
    pub key_id: String,
    /// Server-held key secret for basic auth and signature checks.
    pub key_secret: String,
    /// Base URL of the gateway API.
    pub api_base: String,
}

/// Full service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// PostgreSQL connection string; the role must be able to write the
    /// ledger tables.
    pub database_url: String,
    /// Path to the session signing key.
    pub session_key_file: String,
    /// Whether session cookies carry the `Secure` flag.
    pub cookie_secure: bool,
    /// Card provider, when configured.
    pub card: Option<CardSettings>,
    /// Card webhook secret, when configured.
    pub card_webhook_secret: Option<String>,
    /// Regional gateway, when configured.
    pub gateway: Option<GatewaySettings>,
}

fn var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    var(name).ok_or(ConfigError::missing(name))
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let card = match var("CHECKOUT_SECRET_KEY") {
            Some(secret_key) => Some(CardSettings {
                secret_key,
                api_base: require("CHECKOUT_API_BASE")?,
            }),
            None => None,
        };

        let gateway = match (var("GATEWAY_KEY_ID"), var("GATEWAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(GatewaySettings {
                key_id,
                key_secret,
                api_base: require("GATEWAY_API_BASE")?,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::missing("GATEWAY_KEY_SECRET")),
            (None, Some(_)) => return Err(ConfigError::missing("GATEWAY_KEY_ID")),
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            database_url: require("DATABASE_URL")?,
            session_key_file: var("SESSION_KEY_FILE")
                .unwrap_or_else(|| "/var/run/secrets/session_key".to_owned()),
            cookie_secure: var("SESSION_COOKIE_SECURE").as_deref() != Some("0"),
            card,
            card_webhook_secret: var("CHECKOUT_WEBHOOK_SECRET"),
            gateway,
        })
    }
}
