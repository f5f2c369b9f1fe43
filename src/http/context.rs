//! Request-scoped context handed to route handlers.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::client::AuthClient;
use crate::auth::token::TokenPayload;
use crate::http::error::AppError;
use crate::http::origin::Origin;

/// Everything a handler needs to know about the caller.
///
/// Inserted by the auth middleware; a handler extracting it on a route the
/// middleware does not cover gets a 500.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub origin: Origin,
    pub auth: AuthClient,
    /// Verified token claims, or `None` for an anonymous caller.
    pub user: Option<TokenPayload>,
}

impl RequestContext {
    pub fn new(origin: Origin, auth: AuthClient, user: Option<TokenPayload>) -> Self {
        Self { origin, auth, user }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or(AppError::MissingContext)
    }
}
