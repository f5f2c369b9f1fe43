//! Auth failure page.

use axum::{extract::Query, response::Response};
use serde::Deserialize;
use serde_json::json;

use crate::http::error::AppError;
use crate::routes::root::LoadContext;

#[derive(Debug, Deserialize)]
pub struct AuthErrorQuery {
    pub code: Option<String>,
    pub message: Option<String>,
}

pub async fn page(
    load: LoadContext,
    Query(query): Query<AuthErrorQuery>,
) -> Result<Response, AppError> {
    load.render_page(
        "auth_error.html",
        "Authentication failed",
        json!({"code": query.code, "message": query.message}),
    )
    .await
}
