//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Refuse configurations that would trust unsigned tokens outside development
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// Minimum length of the session cookie signing secret.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("auth.provider_url `{0}` is not an http(s) URL")]
    ProviderUrl(String),
    #[error("auth.anon_key must be set")]
    MissingAnonKey,
    #[error("auth.jwt_secret must be set (unverified tokens are only allowed in development)")]
    MissingJwtSecret,
    #[error("auth.allow_unverified_tokens is set outside the development environment")]
    UnverifiedTokensOutsideDevelopment,
    #[error("auth.session_secret must be at least 32 bytes")]
    ShortSessionSecret,
    #[error("auth.storage_key must be set")]
    MissingStorageKey,
    #[error("render.stream_timeout_ms must be greater than zero")]
    ZeroStreamTimeout,
    #[error("timeouts.request_secs must exceed render.stream_timeout_ms")]
    RequestTimeoutTooShort,
    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match url::Url::parse(&config.auth.provider_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::ProviderUrl(config.auth.provider_url.clone())),
    }

    if config.auth.anon_key.is_empty() {
        errors.push(ValidationError::MissingAnonKey);
    }

    if config.auth.storage_key.is_empty() {
        errors.push(ValidationError::MissingStorageKey);
    }

    if config.auth.allow_unverified_tokens && !config.environment.is_development() {
        errors.push(ValidationError::UnverifiedTokensOutsideDevelopment);
    }

    let has_jwt_secret = config
        .auth
        .jwt_secret
        .as_ref()
        .is_some_and(|secret| !secret.is_empty());
    let unverified_allowed =
        config.auth.allow_unverified_tokens && config.environment.is_development();
    if !has_jwt_secret && !unverified_allowed {
        errors.push(ValidationError::MissingJwtSecret);
    }

    if let Some(secret) = &config.auth.session_secret {
        if secret.expose().len() < MIN_SESSION_SECRET_LEN {
            errors.push(ValidationError::ShortSessionSecret);
        }
    }

    if config.render.stream_timeout_ms == 0 {
        errors.push(ValidationError::ZeroStreamTimeout);
    }

    if config.timeouts.request_secs.saturating_mul(1000) <= config.render.stream_timeout_ms {
        errors.push(ValidationError::RequestTimeoutTooShort);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
