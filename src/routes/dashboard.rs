//! Dashboard page and sign-out action.

use std::sync::Arc;

use axum::response::Response;
use serde_json::json;

use crate::auth::client::AuthClient;
use crate::auth::error::AuthError;
use crate::http::context::RequestContext;
use crate::http::error::AppError;
use crate::render::{Document, Section, SectionError, Templates};
use crate::routes::root::LoadContext;

pub async fn page(load: LoadContext) -> Result<Response, AppError> {
    let Some(user) = load.user() else {
        return Err(AppError::redirect("/sign-in"));
    };
    let provider = user.app_metadata.get("provider").cloned();

    let context = load.page_context("Dashboard", json!({})).await?;
    let templates = load.templates();
    let account = Section::new(
        "account",
        r#"<p aria-busy="true">Loading account…</p>"#,
        load_account(load.ctx.auth.clone(), templates, provider),
    )
    .error_fallback(r#"<p role="alert">Account details are unavailable right now.</p>"#);

    Ok(load
        .render(Document::new("dashboard.html", context).section(account))
        .await)
}

async fn load_account(
    auth: AuthClient,
    templates: Arc<Templates>,
    provider: Option<serde_json::Value>,
) -> Result<String, SectionError> {
    let session = auth.get_session().await?.ok_or("session ended while rendering")?;
    let account = auth.get_user(&session.access_token).await?;
    Ok(templates.render(
        "account.html",
        &json!({"account": account, "provider": provider}),
    )?)
}

/// Sign out and return to the sign-in page.
///
/// A provider rejection is logged and does not block the redirect.
pub async fn sign_out(ctx: RequestContext) -> Result<Response, AppError> {
    match ctx.auth.sign_out().await {
        Ok(()) => tracing::info!("Signed out"),
        Err(AuthError::Provider(error)) => {
            tracing::warn!(error = %error, "Provider rejected sign-out");
        }
        Err(err) => return Err(err.into()),
    }
    Err(AppError::redirect("/sign-in"))
}
