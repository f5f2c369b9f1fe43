//! Session storage backed by HTTP cookies.
//!
//! The auth client persists its state through [`SessionStorage`]. On the
//! server that storage is a single request's `Cookie` header for reads and an
//! accumulating list of `Set-Cookie` headers for writes, drained by the auth
//! middleware once the response exists. Reads see the request's own earlier
//! writes.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{Cookie, CookieJar, Key, SameSite};

use crate::auth::error::StorageError;

/// Key/value storage the auth client persists its state through.
pub trait SessionStorage: Send + Sync {
    /// Read the current value stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete whatever is stored under `key`.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Cookie-backed [`SessionStorage`] bound to one request/response pair.
pub struct CookieStorage {
    session_key: String,
    request_cookies: HashMap<String, String>,
    signing_key: Option<Key>,
    written: Mutex<HashMap<String, Option<String>>>,
    pending: Mutex<Vec<HeaderValue>>,
}

impl CookieStorage {
    /// Build storage over the cookies of an inbound request.
    ///
    /// `session_key` names the cookie holding the serialized session; writes
    /// to it have the embedded `user` removed. When `signing_key` is set,
    /// written cookies are signed and unsigned or tampered cookies read as
    /// absent.
    pub fn from_headers(
        headers: &HeaderMap,
        session_key: impl Into<String>,
        signing_key: Option<Key>,
    ) -> Self {
        let mut request_cookies = HashMap::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse_encoded(value).flatten() {
                request_cookies
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }

        Self {
            session_key: session_key.into(),
            request_cookies,
            signing_key,
            written: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Drain every `Set-Cookie` value written so far, in write order.
    pub fn take_set_cookies(&self) -> Vec<HeaderValue> {
        std::mem::take(&mut *self.pending.lock().expect("cookie storage mutex poisoned"))
    }

    fn base_cookie(key: &str, value: String) -> Cookie<'static> {
        Cookie::build((key.to_string(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    fn push(&self, cookie: &Cookie<'static>) -> Result<(), StorageError> {
        let header = HeaderValue::from_str(&cookie.encoded().to_string())
            .map_err(|_| StorageError::InvalidHeader(cookie.name().to_string()))?;
        self.pending
            .lock()
            .expect("cookie storage mutex poisoned")
            .push(header);
        Ok(())
    }

    fn remember(&self, key: &str, value: Option<String>) {
        self.written
            .lock()
            .expect("cookie storage mutex poisoned")
            .insert(key.to_string(), value);
    }

    fn write(&self, cookie: Cookie<'static>) -> Result<(), StorageError> {
        match &self.signing_key {
            None => self.push(&cookie),
            Some(key) => {
                let mut jar = CookieJar::new();
                jar.signed_mut(key).add(cookie);
                jar.delta().try_for_each(|signed| self.push(signed))
            }
        }
    }
}

/// Remove the `user` object from a serialized session.
///
/// User claims are already carried by the verified access token.
fn strip_user(key: &str, value: &str) -> Result<String, StorageError> {
    let mut parsed: serde_json::Value =
        serde_json::from_str(value).map_err(|source| StorageError::InvalidSession {
            key: key.to_string(),
            source,
        })?;
    if let Some(object) = parsed.as_object_mut() {
        object.remove("user");
    }
    Ok(parsed.to_string())
}

impl SessionStorage for CookieStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        if let Some(written) = self
            .written
            .lock()
            .expect("cookie storage mutex poisoned")
            .get(key)
        {
            return written.clone();
        }

        let raw = self.request_cookies.get(key)?;
        let Some(signing_key) = &self.signing_key else {
            return Some(raw.clone());
        };

        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(key.to_string(), raw.clone()));
        let verified = jar.signed(signing_key).get(key).map(|c| c.value().to_string());
        if verified.is_none() {
            tracing::debug!(cookie = %key, "Discarding cookie with invalid signature");
        }
        verified
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = if key == self.session_key {
            strip_user(key, value)?
        } else {
            value.to_string()
        };
        tracing::debug!(cookie = %key, "Writing cookie");
        self.write(Self::base_cookie(key, value.clone()))?;
        self.remember(key, Some(value));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut cookie = Self::base_cookie(key, String::new());
        cookie.make_removal();
        tracing::debug!(cookie = %key, "Removing cookie");
        self.push(&cookie)?;
        self.remember(key, None);
        Ok(())
    }
}
