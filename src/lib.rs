//! Server-rendered web application with provider-backed authentication.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request ID, tracing, timeout, metrics)
//!                        │
//!                        ▼
//!                     http::origin (public origin)
//!                        │
//!                        ▼
//!                     auth::middleware ──▶ auth::client ──▶ auth provider
//!                        │   (cookies, session, token)
//!                        ▼
//!                     routes::* (RequestContext, redirects, root loader)
//!                        │            │
//!                        │            ▼
//!                        │         query (per-request cache, dehydration)
//!                        ▼
//!                     render (shell first, deferred sections, timeout)
//!     Client Response    │
//!     ◀──────────────────┘  + every Set-Cookie written along the way
//! ```

// Core subsystems
pub mod auth;
pub mod config;
pub mod http;
pub mod query;
pub mod render;
pub mod routes;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
