//! Auth stage of the request chain.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::client::AuthClient;
use crate::auth::cookie::CookieStorage;
use crate::auth::token::TokenPayload;
use crate::http::context::RequestContext;
use crate::http::error::AppError;
use crate::http::origin::{resolve_origin, Origin};
use crate::http::server::AppState;

/// Bind an auth client to the request's cookies, resolve the user and
/// insert the [`RequestContext`].
///
/// Every cookie written while handling the request is appended to the
/// response, whether the handler succeeded, redirected or failed. Writes
/// made by deferred sections after the headers were sent are lost.
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let storage = Arc::new(CookieStorage::from_headers(
        req.headers(),
        state.auth_settings.storage_key.clone(),
        state.cookie_key.clone(),
    ));
    let auth = AuthClient::new(state.http.clone(), state.auth_settings.clone(), storage.clone());

    let mut response = match resolve_user(&state, &auth).await {
        Ok(user) => {
            let origin = match req.extensions().get::<Origin>() {
                Some(origin) => origin.clone(),
                None => resolve_origin(req.headers(), req.uri()),
            };
            tracing::debug!(
                origin = %origin,
                user = user.as_ref().map(|u| u.sub.as_str()),
                "Request context ready"
            );
            req.extensions_mut()
                .insert(RequestContext::new(origin, auth, user));
            next.run(req).await
        }
        Err(err) => err.into_response(),
    };

    for cookie in storage.take_set_cookies() {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

async fn resolve_user(state: &AppState, auth: &AuthClient) -> Result<Option<TokenPayload>, AppError> {
    let Some(session) = auth.get_session().await? else {
        return Ok(None);
    };
    Ok(state.verifier.verify(&session.access_token)?)
}
