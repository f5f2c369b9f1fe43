//! Auth provider client bound to one request.
//!
//! # Responsibilities
//! - Load the session from storage, refreshing it when close to expiry
//! - Start PKCE OAuth sign-in and exchange the returned code
//! - Sign out and clear stored state
//!
//! # Design Decisions
//! - All persistence goes through [`SessionStorage`]; the client never
//!   touches cookies directly
//! - Provider rejections are [`AuthError::Provider`]; transport failures are
//!   propagated unchanged and never retried

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use url::Url;

use crate::auth::cookie::SessionStorage;
use crate::auth::error::{AuthError, ProviderError};
use crate::auth::session::{unix_now, Session, EXPIRY_MARGIN};
use crate::config::AuthConfig;

const PKCE_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
const PKCE_VERIFIER_LEN: usize = 56;

/// Static settings shared by every request's client.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Provider auth endpoint, e.g. `https://x.example.co/auth/v1`.
    pub endpoint: Url,
    pub anon_key: String,
    pub storage_key: String,
}

impl AuthSettings {
    pub fn from_config(config: &AuthConfig) -> Result<Self, url::ParseError> {
        let base = config.provider_url.trim_end_matches('/');
        Ok(Self {
            endpoint: Url::parse(&format!("{}/auth/v1/", base))?,
            anon_key: config.anon_key.expose().to_string(),
            storage_key: config.storage_key.clone(),
        })
    }

    fn code_verifier_key(&self) -> String {
        format!("{}-code-verifier", self.storage_key)
    }
}

/// User record as returned by the provider's `/user` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<String>,
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// OAuth identity providers accepted by the sign-in form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }
}

/// Auth provider client whose storage is bound to the current request.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    settings: Arc<AuthSettings>,
    storage: Arc<dyn SessionStorage>,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("endpoint", &self.settings.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    pub fn new(
        http: reqwest::Client,
        settings: Arc<AuthSettings>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            http,
            settings,
            storage,
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<RequestBuilder, AuthError> {
        let url = self.settings.endpoint.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.settings.anon_key)
            .bearer_auth(bearer.unwrap_or(self.settings.anon_key.as_str())))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, AuthError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(status = status.as_u16(), error = %err, "Failed to read auth provider error body");
                String::new()
            }
        };
        let error = ProviderError::from_body(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), code = ?error.code, "Auth provider rejected request");
        Err(AuthError::Provider(error))
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let issued_at = unix_now();
        let builder = self
            .request(Method::POST, "token", None)?
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let session: Session = self.send(builder).await?.json().await?;
        Ok(session.with_expiry_from(issued_at))
    }

    fn save_session(&self, session: &Session) -> Result<(), AuthError> {
        let value = serde_json::to_string(session)?;
        self.storage.set_item(&self.settings.storage_key, &value)?;
        Ok(())
    }

    fn remove_session(&self) -> Result<(), AuthError> {
        self.storage.remove_item(&self.settings.storage_key)?;
        Ok(())
    }

    /// Current session, refreshed first if it is about to expire.
    ///
    /// Unreadable sessions and refresh tokens the provider rejects clear the
    /// stored session and yield `None`.
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(raw) = self.storage.get_item(&self.settings.storage_key) else {
            return Ok(None);
        };

        let session: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable session");
                self.remove_session()?;
                return Ok(None);
            }
        };

        if !session.expires_within(unix_now(), EXPIRY_MARGIN) {
            return Ok(Some(session));
        }

        tracing::debug!("Session near expiry, refreshing");
        match self
            .token_grant("refresh_token", json!({ "refresh_token": session.refresh_token }))
            .await
        {
            Ok(refreshed) => {
                self.save_session(&refreshed)?;
                Ok(Some(refreshed))
            }
            Err(AuthError::Provider(error)) => {
                tracing::info!(error = %error, "Session refresh rejected, signing out locally");
                self.remove_session()?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Build the provider authorize URL for a PKCE OAuth sign-in.
    ///
    /// The code verifier is stored so the callback can complete the exchange.
    pub fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Url, AuthError> {
        let verifier = generate_pkce_verifier();
        self.storage
            .set_item(&self.settings.code_verifier_key(), &verifier)?;

        let mut url = self.settings.endpoint.join("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", &pkce_challenge(&verifier))
            .append_pair("code_challenge_method", "s256")
            .extend_pairs(query_params);
        Ok(url)
    }

    /// Exchange an OAuth authorization code for a session and store it.
    pub async fn exchange_code_for_session(&self, auth_code: &str) -> Result<Session, AuthError> {
        let verifier_key = self.settings.code_verifier_key();
        let stored = self.storage.get_item(&verifier_key).unwrap_or_default();
        let code_verifier = stored.split('/').next().unwrap_or_default().to_string();

        let result = self
            .token_grant(
                "pkce",
                json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
            )
            .await;
        self.storage.remove_item(&verifier_key)?;

        let session = result?;
        self.save_session(&session)?;
        Ok(session)
    }

    /// Revoke the session everywhere and clear local state.
    ///
    /// A session the provider no longer knows about is still cleared locally.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.get_session().await? {
            let builder = self
                .request(Method::POST, "logout", Some(&session.access_token))?
                .query(&[("scope", "global")]);
            match self.send(builder).await {
                Ok(_) => {}
                Err(AuthError::Provider(error)) if error.is_session_gone() => {
                    tracing::debug!(error = %error, "Session already gone on provider");
                }
                Err(err) => return Err(err),
            }
        }

        self.remove_session()?;
        self.storage.remove_item(&self.settings.code_verifier_key())?;
        Ok(())
    }

    /// Fetch the provider's user record for an access token.
    pub async fn get_user(&self, jwt: &str) -> Result<ProviderUser, AuthError> {
        let builder = self.request(Method::GET, "user", Some(jwt))?;
        Ok(self.send(builder).await?.json().await?)
    }
}

fn generate_pkce_verifier() -> String {
    let mut rng = rand::thread_rng();
    (0..PKCE_VERIFIER_LEN)
        .map(|_| PKCE_CHARSET[rng.gen_range(0..PKCE_CHARSET.len())] as char)
        .collect()
}

fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
