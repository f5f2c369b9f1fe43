//! Sign-up page. Accounts are created on first OAuth sign-in, so the form
//! posts to the sign-in action.

use axum::{extract::Query, http::StatusCode, response::Response};

use crate::http::error::AppError;
use crate::routes::root::LoadContext;
use crate::routes::sign_in::{render_form, FormPage, NextQuery};

pub async fn page(load: LoadContext, Query(query): Query<NextQuery>) -> Result<Response, AppError> {
    if load.user().is_some() {
        return Err(AppError::redirect("/dashboard"));
    }
    render_form(&load, FormPage::SignUp, query.next, None, StatusCode::OK).await
}
