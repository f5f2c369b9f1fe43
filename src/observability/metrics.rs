//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ssr_requests_total` (counter): requests by method, status
//! - `ssr_request_duration_seconds` (histogram): latency distribution
//! - `ssr_renders_total` (counter): document renders by outcome
//! - `ssr_token_verifications_total` (counter): access token checks by outcome
//! - `ssr_dehydrated_queries_total` (counter): queries emitted or skipped
//!
//! # Design Decisions
//! - Labels are low-cardinality; paths are never used as labels
//! - The exporter serves its own HTTP listener separate from the app

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with a scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!("ssr_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    metrics::histogram!("ssr_request_duration_seconds", "method" => method, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

/// Record how a document render finished.
pub fn record_render(outcome: &'static str) {
    metrics::counter!("ssr_renders_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of one access token verification.
pub fn record_token_verification(outcome: &'static str) {
    metrics::counter!("ssr_token_verifications_total", "outcome" => outcome).increment(1);
}

/// Record one dehydration pass.
pub fn record_dehydration(emitted: usize, skipped: usize) {
    metrics::counter!("ssr_dehydrated_queries_total", "result" => "emitted")
        .increment(emitted as u64);
    metrics::counter!("ssr_dehydrated_queries_total", "result" => "skipped")
        .increment(skipped as u64);
}

/// Middleware recording request count and latency.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let response = next.run(req).await;
    record_request(&method, response.status().as_u16(), start);
    response
}
