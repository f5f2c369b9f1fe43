//! Sign-in page and OAuth start action.

use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::client::OAuthProvider;
use crate::auth::error::AuthError;
use crate::http::error::AppError;
use crate::routes::root::LoadContext;

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub provider: Option<String>,
    pub next: Option<String>,
}

/// Which of the two account pages is showing the form.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FormPage {
    SignIn,
    SignUp,
}

/// Render the provider form.
pub(crate) async fn render_form(
    load: &LoadContext,
    kind: FormPage,
    next: Option<String>,
    error: Option<&str>,
    status: StatusCode,
) -> Result<Response, AppError> {
    let (title, heading, description, alternate) = match kind {
        FormPage::SignIn => (
            "Sign in",
            "Welcome back",
            "Sign in to your account",
            json!({"prompt": "Don't have an account?", "href": "/sign-up", "label": "Sign Up Now"}),
        ),
        FormPage::SignUp => (
            "Sign up",
            "Get started",
            "Create a new account",
            json!({"prompt": "Have an account?", "href": "/sign-in", "label": "Sign In Now"}),
        ),
    };
    let page = json!({
        "heading": heading,
        "description": description,
        "alternate": alternate,
        "error": error,
        "next": next.unwrap_or_else(|| "/dashboard".to_string()),
    });
    let mut response = load.render_page("sign_in.html", title, page).await?;
    if response.status().is_success() {
        *response.status_mut() = status;
    }
    Ok(response)
}

pub async fn page(load: LoadContext, Query(query): Query<NextQuery>) -> Result<Response, AppError> {
    if load.user().is_some() {
        return Err(AppError::redirect("/dashboard"));
    }
    render_form(&load, FormPage::SignIn, query.next, None, StatusCode::OK).await
}

/// Start a PKCE OAuth sign-in and send the browser to the provider.
pub async fn start(load: LoadContext, Form(form): Form<SignInForm>) -> Result<Response, AppError> {
    let provider = match form.provider.as_deref() {
        Some("google") => OAuthProvider::Google,
        other => {
            tracing::info!(provider = ?other, "Rejected sign-in form");
            return render_form(
                &load,
                FormPage::SignIn,
                form.next,
                Some("Choose a supported sign-in provider."),
                StatusCode::BAD_REQUEST,
            )
            .await;
        }
    };

    let mut redirect_to = url::Url::parse(&format!("{}/auth/callback", load.ctx.origin))
        .map_err(AuthError::from)?;
    redirect_to
        .query_pairs_mut()
        .append_pair("next", form.next.as_deref().unwrap_or("/"));

    let url = match load.ctx.auth.sign_in_with_oauth(
        provider,
        redirect_to.as_str(),
        &[("access_type", "offline"), ("prompt", "consent")],
    ) {
        Ok(url) => url,
        Err(AuthError::Provider(error)) => return Err(AppError::auth_error_page(&error)),
        Err(err) => return Err(err.into()),
    };

    tracing::info!(provider = provider.as_str(), "Starting OAuth sign-in");
    Ok(AppError::redirect(url.to_string()).into_response())
}
