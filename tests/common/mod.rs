//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Request, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use cookie::Cookie;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use edge_ssr::config::{AppConfig, SecretString};
use edge_ssr::HttpServer;

pub const JWT_SECRET: &str = "integration-test-jwt-secret-at-least-32-chars";
pub const ANON_KEY: &str = "anon-key-for-tests";
pub const SESSION_COOKIE: &str = "__session";
pub const VERIFIER_COOKIE: &str = "__session-code-verifier";
pub const USER_ID: &str = "d0e7a0f2-59a2-4d8f-a7d8-1b5a0c0f6a11";
pub const USER_EMAIL: &str = "user@example.com";

pub const GOOD_CODE: &str = "good-code";
pub const GOOD_REFRESH: &str = "good-refresh";

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Claims the provider would put in an access token.
pub fn claims(exp: u64) -> Value {
    json!({
        "aal": "aal1",
        "amr": [{"method": "oauth", "timestamp": now()}],
        "app_metadata": {"provider": "google", "providers": ["google"]},
        "aud": "authenticated",
        "email": USER_EMAIL,
        "exp": exp,
        "iat": now(),
        "is_anonymous": false,
        "iss": "http://127.0.0.1/auth/v1",
        "phone": "",
        "role": "authenticated",
        "session_id": "7b0f6d1e-2c7a-4bb0-9a4e-2ad2f5c1e0aa",
        "sub": USER_ID,
        "user_metadata": {"full_name": "Test User"},
    })
}

pub fn sign(claims: &Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn access_token() -> String {
    sign(&claims(now() + 3600), JWT_SECRET)
}

/// Session as stored in the cookie (no `user`).
pub fn session_json(access_token: &str, refresh_token: &str, expires_at: u64) -> String {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_in": 3600,
        "expires_at": expires_at,
        "token_type": "bearer",
    })
    .to_string()
}

pub fn valid_session() -> String {
    session_json(&access_token(), GOOD_REFRESH, now() + 3600)
}

fn provider_session() -> Value {
    json!({
        "access_token": access_token(),
        "refresh_token": "fresh-refresh",
        "expires_in": 3600,
        "expires_at": now() + 3600,
        "token_type": "bearer",
        "user": {"id": USER_ID, "email": USER_EMAIL},
    })
}

/// Calls received by the mock provider, in order.
#[derive(Clone, Default)]
pub struct ProviderLog(Arc<Mutex<Vec<String>>>);

impl ProviderLog {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub struct MockProvider {
    pub url: String,
    pub log: ProviderLog,
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY)
}

async fn token(
    State(log): State<ProviderLog>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let grant = query.get("grant_type").cloned().unwrap_or_default();
    log.push(format!("token:{grant}"));
    if !has_api_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "No API key found"})))
            .into_response();
    }

    match grant.as_str() {
        "pkce" if body["auth_code"] == GOOD_CODE && body["code_verifier"] != "" => {
            Json(provider_session()).into_response()
        }
        "pkce" => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": 400,
                "error_code": "flow_state_not_found",
                "msg": "invalid flow state, no valid flow state found",
            })),
        )
            .into_response(),
        "refresh_token" if body["refresh_token"] == GOOD_REFRESH => {
            Json(provider_session()).into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Refresh Token Not Found",
            })),
        )
            .into_response(),
    }
}

async fn logout(State(log): State<ProviderLog>, headers: HeaderMap) -> StatusCode {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if bearer == format!("Bearer {}", ANON_KEY) {
        log.push("logout:anon");
        return StatusCode::UNAUTHORIZED;
    }
    log.push("logout");
    StatusCode::NO_CONTENT
}

async fn user(State(log): State<ProviderLog>) -> Json<Value> {
    log.push("user");
    Json(json!({
        "id": USER_ID,
        "email": USER_EMAIL,
        "last_sign_in_at": "2024-05-01T12:00:00Z",
        "app_metadata": {"provider": "google"},
        "role": "authenticated",
    }))
}

/// Start a mock auth provider on an ephemeral port.
pub async fn start_mock_provider() -> MockProvider {
    let log = ProviderLog::default();
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/auth/v1/user", get(user))
        .with_state(log.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProvider {
        url: format!("http://{}", addr),
        log,
    }
}

pub fn test_config(provider_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.provider_url = provider_url.into();
    config.auth.anon_key = SecretString::new(ANON_KEY);
    config.auth.jwt_secret = Some(SecretString::new(JWT_SECRET));
    config.render.stream_timeout_ms = 2_000;
    config
}

/// The fully-layered application router against `provider`.
pub fn app(provider: &MockProvider) -> Router {
    HttpServer::new(test_config(&provider.url))
        .unwrap()
        .router()
}

pub fn cookie_header(cookies: &[(&str, &str)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| {
            Cookie::new(name.to_string(), value.to_string())
                .encoded()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get_request(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn set_cookies(response: &Response<Body>) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| Cookie::parse_encoded(v.to_str().unwrap().to_string()).unwrap())
        .collect()
}

pub fn find_cookie<'a>(cookies: &'a [Cookie<'static>], name: &str) -> Option<&'a Cookie<'static>> {
    cookies.iter().find(|c| c.name() == name)
}

pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
