//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → origin.rs (public origin → request extension)
//!     → [auth middleware builds the RequestContext]
//!     → context.rs (extracted by route handlers)
//!     → error.rs (redirects and fatal errors → responses)
//! ```

pub mod context;
pub mod error;
pub mod origin;
pub mod server;

pub use context::RequestContext;
pub use error::AppError;
pub use origin::{origin_middleware, resolve_origin, Origin};
pub use server::{AppState, HttpServer, ServerError, X_REQUEST_ID};
