//! Access token verification.
//!
//! # Responsibilities
//! - Verify HS256 signatures and expiry against the configured secret
//! - Decode unsigned payloads in explicitly-enabled development mode
//! - Validate claims against the fixed [`TokenPayload`] schema
//!
//! # Design Decisions
//! - Output is a fully-validated payload or an explicit absence
//! - Token-level failures resolve to "no user"; key/crypto failures are fatal

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{AppConfig, ValidationError};
use crate::observability::metrics;

/// One authentication method recorded in the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthMethod {
    pub method: String,
    pub timestamp: i64,
}

/// Validated claims of a provider-issued access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Authenticator assurance level.
    pub aal: String,
    /// Authentication methods reference.
    pub amr: Vec<AuthMethod>,
    pub app_metadata: Map<String, Value>,
    pub aud: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub is_anonymous: bool,
    pub iss: String,
    pub phone: String,
    pub role: String,
    pub session_id: String,
    pub sub: String,
    pub user_metadata: Map<String, Value>,
}

/// Verification failure that is not attributable to the token itself.
#[derive(Debug, thiserror::Error)]
#[error("token verification failed unexpectedly: {0}")]
pub struct VerifyError(#[from] jsonwebtoken::errors::Error);

/// How tokens are trusted.
pub enum VerificationMode {
    /// Verify HS256 signatures with the shared secret.
    Secret(DecodingKey),
    /// Decode payloads without any signature check. Development only.
    Unverified,
}

impl VerificationMode {
    /// Choose the mode for a configuration.
    ///
    /// The unverified mode needs both the development environment and the
    /// explicit `allow_unverified_tokens` flag; a missing secret alone is an
    /// error.
    pub fn from_config(config: &AppConfig) -> Result<Self, ValidationError> {
        match &config.auth.jwt_secret {
            Some(secret) if !secret.is_empty() => Ok(VerificationMode::Secret(
                DecodingKey::from_secret(secret.expose().as_bytes()),
            )),
            _ if config.environment.is_development() && config.auth.allow_unverified_tokens => {
                Ok(VerificationMode::Unverified)
            }
            _ => Err(ValidationError::MissingJwtSecret),
        }
    }
}

/// Verifies bearer tokens into [`TokenPayload`]s.
pub struct TokenVerifier {
    mode: VerificationMode,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(mode: VerificationMode) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);
        if matches!(mode, VerificationMode::Unverified) {
            tracing::warn!("Access tokens are NOT verified; development mode only");
        }
        Self { mode, validation }
    }

    /// Verify `token` and return its claims.
    ///
    /// Returns `Ok(None)` for any token that is malformed, unsigned, expired,
    /// or whose claims do not match the schema.
    pub fn verify(&self, token: &str) -> Result<Option<TokenPayload>, VerifyError> {
        let claims = match &self.mode {
            VerificationMode::Unverified => match decode_unverified(token) {
                Some(claims) => claims,
                None => {
                    metrics::record_token_verification("malformed");
                    return Ok(None);
                }
            },
            VerificationMode::Secret(key) => {
                match jsonwebtoken::decode::<Value>(token, key, &self.validation) {
                    Ok(data) => data.claims,
                    Err(err) if is_token_error(err.kind()) => {
                        tracing::info!(error = %err, "Rejected access token");
                        metrics::record_token_verification("rejected");
                        return Ok(None);
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Token verification failed");
                        metrics::record_token_verification("error");
                        return Err(VerifyError(err));
                    }
                }
            }
        };

        match serde_json::from_value::<TokenPayload>(claims) {
            Ok(payload) => {
                metrics::record_token_verification("valid");
                Ok(Some(payload))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Access token claims do not match schema");
                metrics::record_token_verification("invalid_claims");
                Ok(None)
            }
        }
    }
}

/// Failures caused by the token rather than by the verifier's key material.
fn is_token_error(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidClaimFormat(_)
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
    )
}

fn decode_unverified(token: &str) -> Option<Value> {
    let segment = token.split('.').nth(1)?;
    let bytes = match URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "Access token payload is not base64");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(error = %err, "Access token payload is not JSON");
            None
        }
    }
}
