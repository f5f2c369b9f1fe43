//! Auth subsystem errors.

use serde::Deserialize;

/// Failure writing to session storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session value for `{key}` is not valid JSON: {source}")]
    InvalidSession {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cookie value for `{0}` is not a valid header value")]
    InvalidHeader(String),
}

/// Error reported by the auth provider itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "provider returned {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Error body shapes the provider uses across its endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProviderErrorBody {
    error_code: Option<String>,
    code: Option<serde_json::Value>,
    error: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

impl ProviderError {
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed
            .error_code
            .or(match parsed.code {
                Some(serde_json::Value::String(s)) => Some(s),
                _ => None,
            })
            .or(parsed.error);
        Self {
            status,
            code,
            message: parsed.msg.or(parsed.message).or(parsed.error_description),
        }
    }

    /// Errors that mean the session is already gone on the provider side.
    pub fn is_session_gone(&self) -> bool {
        matches!(self.status, 401 | 403 | 404)
    }
}

/// Error from an auth client operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider rejected the request. Recoverable by the caller.
    #[error("{0}")]
    Provider(ProviderError),
    /// The provider could not be reached or answered garbage. Fatal.
    #[error("auth provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}
