//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the application server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deployment environment. Gates development-only behaviour.
    pub environment: Environment,

    /// Auth provider and session cookie settings.
    pub auth: AuthConfig,

    /// Streaming render settings.
    pub render: RenderConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// A configuration value that must never show up in logs.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// Auth provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the auth provider project (without `/auth/v1`).
    pub provider_url: String,

    /// Public anonymous API key sent with every provider call.
    pub anon_key: SecretString,

    /// HS256 secret used to verify access tokens.
    pub jwt_secret: Option<SecretString>,

    /// Secret used to sign session cookies (at least 32 bytes).
    pub session_secret: Option<SecretString>,

    /// Cookie name holding the serialized session.
    pub storage_key: String,

    /// Accept unsigned tokens. Only honoured in development.
    pub allow_unverified_tokens: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:54321".to_string(),
            anon_key: SecretString::new(""),
            jwt_secret: None,
            session_secret: None,
            storage_key: "__session".to_string(),
            allow_unverified_tokens: false,
        }
    }
}

/// Streaming render configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Time after which unsettled deferred sections are rejected.
    pub stream_timeout_ms: u64,

    /// Render every document fully before responding.
    pub spa_mode: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            stream_timeout_ms: 5_000,
            spa_mode: false,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for calls to the auth provider in seconds.
    pub provider_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            provider_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            environment = "development"

            [auth]
            provider_url = "https://project.example.co"
            anon_key = "anon"
            "#,
        )
        .unwrap();

        assert!(config.environment.is_development());
        assert_eq!(config.auth.storage_key, "__session");
        assert_eq!(config.auth.anon_key.expose(), "anon");
        assert_eq!(config.render.stream_timeout_ms, 5_000);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_secrets_are_redacted() {
        let secret = SecretString::new("super-secret");
        assert_eq!(format!("{:?}", secret), "SecretString(***)");
    }
}
