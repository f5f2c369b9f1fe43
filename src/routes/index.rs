//! Landing page.

use axum::response::Response;
use serde_json::json;

use crate::http::error::AppError;
use crate::routes::root::LoadContext;

pub async fn page(load: LoadContext) -> Result<Response, AppError> {
    load.render_page("index.html", "Home", json!({})).await
}
