//! Application pages and actions.
//!
//! # Data Flow
//! ```text
//! Request (RequestContext already inserted)
//!     → root.rs (LoadContext: query client, render mode, root loader)
//!     → page handler (redirects, page data, deferred sections)
//!     → StreamingRenderer
//! ```

pub mod auth_callback;
pub mod auth_error;
pub mod dashboard;
pub mod index;
pub mod redirect;
pub mod root;
pub mod sign_in;
pub mod sign_up;

use axum::{routing::get, Router};

use crate::http::server::AppState;

pub use redirect::safe_redirect;
pub use root::{root_loader, LoadContext, AUTH_USER_QUERY};

/// All application routes, before middleware and state are attached.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index::page))
        .route("/sign-in", get(sign_in::page).post(sign_in::start))
        .route("/sign-up", get(sign_up::page))
        .route("/auth/callback", get(auth_callback::callback))
        .route("/auth/error", get(auth_error::page))
        .route("/dashboard", get(dashboard::page).post(dashboard::sign_out))
}
