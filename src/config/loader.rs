//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{AppConfig, Environment, SecretString};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {name}: {value}")]
    Env { name: &'static str, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay values supplied through the environment on top of `config`.
///
/// Secrets are normally supplied this way rather than committed to the
/// config file.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("SUPABASE_URL") {
        config.auth.provider_url = url;
    }
    if let Some(key) = lookup("SUPABASE_ANON_KEY") {
        config.auth.anon_key = SecretString::new(key);
    }
    if let Some(secret) = lookup("SUPABASE_JWT_SECRET").filter(|s| !s.is_empty()) {
        config.auth.jwt_secret = Some(SecretString::new(secret));
    }
    if let Some(secret) = lookup("SESSION_SECRET").filter(|s| !s.is_empty()) {
        config.auth.session_secret = Some(SecretString::new(secret));
    }
    if let Some(addr) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(env) = lookup("APP_ENV") {
        config.environment = match env.to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "production" | "prod" => Environment::Production,
            _ => {
                return Err(ConfigError::Env {
                    name: "APP_ENV",
                    value: env,
                })
            }
        };
    }
    Ok(())
}
