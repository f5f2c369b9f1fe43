//! Root loader shared by every page.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::auth::token::TokenPayload;
use crate::http::context::RequestContext;
use crate::http::error::AppError;
use crate::http::server::AppState;
use crate::query::{DehydratedState, QueryClient, QueryKey};
use crate::render::{Document, RenderMode, StreamingRenderer, Templates};

/// Query holding the verified user claims (or `null`).
pub const AUTH_USER_QUERY: &str = "auth-user";

/// Per-request inputs for loading and rendering a page.
pub struct LoadContext {
    pub ctx: RequestContext,
    pub queries: QueryClient,
    pub mode: RenderMode,
    renderer: StreamingRenderer,
}

impl FromRequestParts<AppState> for LoadContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok());
        Ok(Self {
            ctx,
            queries: QueryClient::new(state.dehydration.clone()),
            mode: RenderMode::for_request(user_agent, state.config.render.spa_mode),
            renderer: state.renderer.clone(),
        })
    }
}

/// Seed the auth-user query from the request context and dehydrate.
pub async fn root_loader(
    ctx: &RequestContext,
    queries: &QueryClient,
) -> Result<DehydratedState, AppError> {
    let user = serde_json::to_value(&ctx.user)?;
    queries
        .ensure_query_data(&QueryKey::from([AUTH_USER_QUERY]), || async move {
            Ok::<_, serde_json::Error>(user)
        })
        .await?;
    Ok(queries.dehydrate_once())
}

impl LoadContext {
    pub fn user(&self) -> Option<&TokenPayload> {
        self.ctx.user.as_ref()
    }

    /// Template context for a page: root loader output merged with `page`.
    pub async fn page_context(&self, title: &str, page: Value) -> Result<Value, AppError> {
        let dehydrated = root_loader(&self.ctx, &self.queries).await?;
        let mut context = json!({
            "title": title,
            "user": self.ctx.user,
            "dehydrated_state": dehydrated.to_script_json()?,
        });
        if let (Some(base), Value::Object(page)) = (context.as_object_mut(), page) {
            base.extend(page);
        }
        Ok(context)
    }

    pub fn templates(&self) -> Arc<Templates> {
        self.renderer.templates().clone()
    }

    pub async fn render(&self, document: Document) -> Response {
        self.renderer.render(document, self.mode).await.into_response()
    }

    /// Render a page without deferred sections.
    pub async fn render_page(
        &self,
        template: &'static str,
        title: &str,
        page: Value,
    ) -> Result<Response, AppError> {
        let context = self.page_context(title, page).await?;
        Ok(self.render(Document::new(template, context)).await)
    }
}
