//! OAuth callback: exchange the code for a session.

use axum::{extract::Query, response::Response};
use serde::Deserialize;

use crate::auth::error::AuthError;
use crate::http::context::RequestContext;
use crate::http::error::AppError;
use crate::routes::redirect::safe_redirect;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
}

pub async fn callback(
    ctx: RequestContext,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let code = query.code.unwrap_or_default();
    match ctx.auth.exchange_code_for_session(&code).await {
        Ok(session) => {
            tracing::info!(expires_at = ?session.expires_at, "OAuth sign-in completed");
            Err(AppError::redirect(safe_redirect(query.next.as_deref(), "/")))
        }
        Err(AuthError::Provider(error)) => {
            tracing::warn!(error = %error, "OAuth code exchange rejected");
            Err(AppError::auth_error_page(&error))
        }
        Err(err) => Err(err.into()),
    }
}
