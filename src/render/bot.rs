//! Crawler detection for render mode selection.

use std::sync::LazyLock;

use regex::Regex;

static CRAWLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bbot\b|bot[/;+]|crawl|spider|slurp|scrape|fetch|headless|lighthouse|facebookexternalhit|embedly|preview|archiver|bingpreview|mediapartners|google-(?:inspectiontool|read-aloud|site-verification)|whatsapp|python-requests|curl/|wget/|http_request|go-http-client|okhttp|java/|feed",
    )
    .expect("crawler pattern is valid")
});

/// Whether `user_agent` identifies an automated client.
///
/// An empty user agent is not treated as a crawler.
pub fn is_bot(user_agent: &str) -> bool {
    let user_agent = user_agent.trim();
    !user_agent.is_empty() && CRAWLER.is_match(user_agent)
}
