//! HTTP-facing error type.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::auth::error::{AuthError, ProviderError};
use crate::auth::token::VerifyError;

/// Outcome of a handler or middleware stage that is not a normal response.
///
/// `Redirect` is control flow and becomes a `302 Found`; every other variant
/// is fatal for the request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("redirect to {0}")]
    Redirect(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("failed to serialize page state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("request context missing; is the auth middleware installed?")]
    MissingContext,
}

impl AppError {
    pub fn redirect(location: impl Into<String>) -> Self {
        AppError::Redirect(location.into())
    }

    /// Redirect to the auth error page describing `error`.
    pub fn auth_error_page(error: &ProviderError) -> Self {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(code) = &error.code {
            query.append_pair("code", code);
        }
        if let Some(message) = &error.message {
            query.append_pair("message", message);
        }
        let query = query.finish();
        if query.is_empty() {
            AppError::redirect("/auth/error")
        } else {
            AppError::redirect(format!("/auth/error?{}", query))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Redirect(location) => match HeaderValue::from_str(&location) {
                Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
                Err(_) => {
                    tracing::error!(location = %location, "Redirect target is not a valid header");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
            other => {
                tracing::error!(error = %other, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
