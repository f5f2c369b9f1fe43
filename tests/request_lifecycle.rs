//! End-to-end request handling against a mock auth provider.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::Value;
use url::Url;

use common::*;

fn with_session(uri: &str, session: &str) -> Request<Body> {
    get_request(uri)
        .header(header::COOKIE, cookie_header(&[(SESSION_COOKIE, session)]))
        .body(Body::empty())
        .unwrap()
}

fn form_post(uri: &str, body: &'static str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, body.len())
}

#[tokio::test]
async fn test_anonymous_dashboard_redirects_to_sign_in() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let response = send(&app, get_request("/dashboard").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/sign-in");
    assert!(set_cookies(&response).is_empty());
    assert!(response.headers().contains_key("x-request-id"));
    assert!(provider.log.calls().is_empty());
}

#[tokio::test]
async fn test_authenticated_dashboard_streams_account_section() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let response = send(&app, with_session("/dashboard", &valid_session())).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert!(set_cookies(&response).is_empty());

    let html = body_text(response).await;
    assert!(html.contains("<h1>Dashboard</h1>"));
    assert!(html.contains(USER_EMAIL));
    assert!(html.contains(r#"<div data-section="account">"#));
    assert!(html.contains(r#"<template data-section-content="account">"#));
    assert!(html.contains(USER_ID));
    assert!(html.trim_end().ends_with("</html>"));
    assert_eq!(provider.log.calls(), vec!["user"]);
}

#[tokio::test]
async fn test_landing_page_dehydrates_auth_user() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let html = body_text(send(&app, get_request("/").body(Body::empty()).unwrap()).await).await;

    let start = html.find("window.__DEHYDRATED_STATE__ = ").unwrap() + 30;
    let end = start + html[start..].find(";</script>").unwrap();
    let state: Value = serde_json::from_str(&html[start..end]).unwrap();

    assert_eq!(state["queries"][0]["queryKey"], serde_json::json!(["auth-user"]));
    assert_eq!(state["queries"][0]["state"]["data"], Value::Null);
    assert_eq!(state["queries"][0]["state"]["status"], "success");
    assert!(html.contains(r#"href="/sign-in""#));
}

#[tokio::test]
async fn test_sign_in_redirects_to_provider_with_forwarded_origin() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let request = form_post("/sign-in", "provider=google&next=%2Fdashboard")
        .header("x-forwarded-proto", "http, https")
        .header("x-forwarded-host", "internal:8080, app.example.com")
        .body(Body::from("provider=google&next=%2Fdashboard"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let authorize = Url::parse(&location(&response)).unwrap();
    assert!(authorize.as_str().starts_with(&format!("{}/auth/v1/authorize?", provider.url)));

    let params: std::collections::HashMap<_, _> = authorize.query_pairs().into_owned().collect();
    assert_eq!(params["provider"], "google");
    assert_eq!(
        params["redirect_to"],
        "https://app.example.com/auth/callback?next=%2Fdashboard"
    );
    assert_eq!(params["code_challenge_method"], "s256");
    assert_eq!(params["access_type"], "offline");
    assert_eq!(params["prompt"], "consent");
    assert_eq!(params["code_challenge"].len(), 43);

    let cookies = set_cookies(&response);
    let verifier = find_cookie(&cookies, VERIFIER_COOKIE).unwrap();
    assert_eq!(verifier.value().len(), 56);
    assert_eq!(verifier.http_only(), Some(true));
    assert_eq!(verifier.path(), Some("/"));
}

#[tokio::test]
async fn test_sign_in_rejects_unknown_provider() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let request = form_post("/sign-in", "provider=github")
        .body(Body::from("provider=github"))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
    assert!(body_text(response).await.contains(r#"role="alert""#));
}

#[tokio::test]
async fn test_signed_in_user_skips_sign_in_page() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    for page in ["/sign-in", "/sign-up"] {
        let response = send(&app, with_session(page, &valid_session())).await;
        assert_eq!(response.status(), StatusCode::FOUND, "{page}");
        assert_eq!(location(&response), "/dashboard");
    }
}

#[tokio::test]
async fn test_callback_stores_session_without_user() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let request = get_request("/auth/callback?code=good-code&next=%2Fdashboard")
        .header(header::COOKIE, cookie_header(&[(VERIFIER_COOKIE, "verifier-value")]))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/dashboard");

    let cookies = set_cookies(&response);
    let session = find_cookie(&cookies, SESSION_COOKIE).unwrap();
    assert_eq!(session.http_only(), Some(true));
    assert_eq!(session.same_site(), Some(cookie::SameSite::Lax));
    let stored: Value = serde_json::from_str(session.value()).unwrap();
    assert!(stored.get("user").is_none());
    assert_eq!(stored["refresh_token"], "fresh-refresh");

    let verifier = find_cookie(&cookies, VERIFIER_COOKIE).unwrap();
    assert_eq!(verifier.value(), "");
    assert_eq!(verifier.max_age(), Some(cookie::time::Duration::ZERO));

    assert_eq!(provider.log.calls(), vec!["token:pkce"]);
}

#[tokio::test]
async fn test_callback_rejects_offsite_next() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let request = get_request("/auth/callback?code=good-code&next=%2F%2Fevil.example")
        .header(header::COOKIE, cookie_header(&[(VERIFIER_COOKIE, "verifier-value")]))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_callback_provider_error_redirects_to_error_page() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let response = send(
        &app,
        get_request("/auth/callback?code=expired").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/auth/error?code=flow_state_not_found&message=invalid+flow+state%2C+no+valid+flow+state+found"
    );
    assert!(find_cookie(&set_cookies(&response), SESSION_COOKIE).is_none());

    let page = send(&app, get_request(&location(&response)).body(Body::empty()).unwrap()).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_text(page).await.contains("flow_state_not_found"));
}

#[tokio::test]
async fn test_sign_out_clears_cookies() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let request = Request::builder()
        .method("POST")
        .uri("/dashboard")
        .header(header::COOKIE, cookie_header(&[(SESSION_COOKIE, &valid_session())]))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/sign-in");

    let cookies = set_cookies(&response);
    for name in [SESSION_COOKIE, VERIFIER_COOKIE] {
        let removal = find_cookie(&cookies, name).unwrap();
        assert_eq!(removal.value(), "", "{name}");
        assert_eq!(removal.max_age(), Some(cookie::time::Duration::ZERO));
    }
    assert_eq!(provider.log.calls(), vec!["logout"]);
}

#[tokio::test]
async fn test_expiring_session_is_refreshed() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let expiring = session_json(&access_token(), GOOD_REFRESH, now() + 30);
    let response = send(&app, with_session("/dashboard", &expiring)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    let session = find_cookie(&cookies, SESSION_COOKIE).unwrap();
    let stored: Value = serde_json::from_str(session.value()).unwrap();
    assert_eq!(stored["refresh_token"], "fresh-refresh");
    assert!(stored.get("user").is_none());

    body_text(response).await;
    // The deferred section reads the refreshed session instead of refreshing again.
    assert_eq!(provider.log.calls(), vec!["token:refresh_token", "user"]);
}

#[tokio::test]
async fn test_rejected_refresh_signs_out_locally() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let expiring = session_json(&access_token(), "revoked", now() + 30);
    let response = send(&app, with_session("/dashboard", &expiring)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/sign-in");
    let cookies = set_cookies(&response);
    assert_eq!(find_cookie(&cookies, SESSION_COOKIE).unwrap().value(), "");
}

#[tokio::test]
async fn test_bad_tokens_mean_no_user() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let forged = session_json(
        &sign(&claims(now() + 3600), "some-other-secret-of-sufficient-length"),
        GOOD_REFRESH,
        now() + 3600,
    );
    let response = send(&app, with_session("/dashboard", &forged)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/sign-in");

    let response = send(&app, with_session("/dashboard", "not json")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let cookies = set_cookies(&response);
    assert_eq!(find_cookie(&cookies, SESSION_COOKIE).unwrap().value(), "");
}

#[tokio::test]
async fn test_crawlers_get_complete_documents() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let request = get_request("/dashboard")
        .header(header::USER_AGENT, "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)")
        .header(header::COOKIE, cookie_header(&[(SESSION_COOKIE, &valid_session())]))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"<template data-section-content="account">"#));
    assert!(html.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let provider = start_mock_provider().await;
    let app = app(&provider);

    let request = get_request("/")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.headers()["x-request-id"], "req-123");
}
