//! Public origin resolution.
//!
//! # Responsibilities
//! - Derive the externally visible `scheme://host` of a request
//! - Honour proxy headers (`X-Forwarded-Proto`, `X-Forwarded-Host`)
//! - Store the result as a request extension for later stages
//!
//! # Design Decisions
//! - The last value of a comma-separated forwarded header wins (closest proxy)
//! - Resolution never fails; `http` and `localhost` are the final fallbacks

use axum::{
    extract::Request,
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};

pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// The scheme and host a client used to reach the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin(String);

impl Origin {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn last_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the public origin from request headers and URI.
pub fn resolve_origin(headers: &HeaderMap, uri: &Uri) -> Origin {
    let protocol = last_value(headers, X_FORWARDED_PROTO).unwrap_or("http");

    let host = last_value(headers, X_FORWARDED_HOST)
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    Origin(format!("{}://{}", protocol, host))
}

/// First stage of the request chain: compute and store the origin.
pub async fn origin_middleware(mut req: Request, next: Next) -> Response {
    let origin = resolve_origin(req.headers(), req.uri());
    tracing::trace!(origin = %origin, "Resolved request origin");
    req.extensions_mut().insert(origin);
    next.run(req).await
}
