//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared application state from config
//! - Create the Axum router with all pages
//! - Wire up middleware (origin, auth, metrics, request ID, tracing, timeout)
//! - Serve with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, Request},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use cookie::Key;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::client::AuthSettings;
use crate::auth::middleware::auth_middleware;
use crate::auth::token::{TokenVerifier, VerificationMode};
use crate::config::{validate_config, AppConfig, ConfigError};
use crate::http::origin::origin_middleware;
use crate::observability::metrics;
use crate::query::DehydrationRegistry;
use crate::render::{StreamingRenderer, Templates};
use crate::routes;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Failure assembling the server from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid auth provider URL: {0}")]
    ProviderUrl(#[from] url::ParseError),
    #[error("failed to load templates: {0}")]
    Templates(#[from] minijinja::Error),
    #[error("failed to build provider HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Pooled client for auth provider calls.
    pub http: reqwest::Client,
    pub auth_settings: Arc<AuthSettings>,
    /// Signs session cookies when a session secret is configured.
    pub cookie_key: Option<Key>,
    pub verifier: Arc<TokenVerifier>,
    pub renderer: StreamingRenderer,
    pub dehydration: Arc<DehydrationRegistry>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let mode = VerificationMode::from_config(&config)
            .map_err(|e| ConfigError::Validation(vec![e]))?;
        let auth_settings = AuthSettings::from_config(&config.auth)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.provider_secs))
            .build()?;
        let cookie_key = config
            .auth
            .session_secret
            .as_ref()
            .map(|secret| Key::derive_from(secret.expose().as_bytes()));
        let renderer = StreamingRenderer::new(
            Arc::new(Templates::builtin()?),
            Duration::from_millis(config.render.stream_timeout_ms),
        );

        Ok(Self {
            config: Arc::new(config),
            http,
            auth_settings: Arc::new(auth_settings),
            cookie_key,
            verifier: Arc::new(TokenVerifier::new(mode)),
            renderer,
            dehydration: Arc::new(DehydrationRegistry::new()),
        })
    }
}

/// HTTP server for the application.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        let state = AppState::from_config(config)?;
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        routes::router()
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .layer(from_fn(origin_middleware))
            .with_state(state)
            .layer(from_fn(metrics::track_metrics))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// The fully-layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.environment,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
