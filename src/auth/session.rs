//! Provider session model.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sessions expiring within this margin are refreshed before use.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(90);

/// Session state as issued by the auth provider.
///
/// Fields the service does not use are kept in `extra` so the stored
/// session round-trips unchanged apart from `user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Session {
    /// Fill in `expires_at` from `expires_in` when the provider omitted it.
    pub(crate) fn with_expiry_from(mut self, issued_at: u64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(issued_at + self.expires_in);
        }
        self
    }

    /// Whether the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: u64, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at.saturating_sub(now) < margin.as_secs(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive() {
        let raw = json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1_700_003_600u64,
            "token_type": "bearer",
            "weak_password": null,
        });
        let session: Session = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&session).unwrap(), raw);
    }

    #[test]
    fn test_expiry_margin() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "token_type": "bearer",
        }))
        .unwrap();
        assert!(!session.expires_within(0, EXPIRY_MARGIN));

        let session = session.with_expiry_from(1_000);
        assert_eq!(session.expires_at, Some(4_600));
        assert!(!session.expires_within(1_000, EXPIRY_MARGIN));
        assert!(session.expires_within(4_520, EXPIRY_MARGIN));
        assert!(session.expires_within(5_000, EXPIRY_MARGIN));
    }
}
