//! One-shot dehydration of query cache state.
//!
//! Each query is emitted at most once per state: a fingerprint of its hash
//! and update counters is remembered per client, and a later dehydration of
//! the same client skips queries whose fingerprint was already emitted. A
//! query that has been updated since gets a new fingerprint and is emitted
//! again.

use std::collections::HashSet;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::observability::metrics;
use crate::query::client::{Query, QueryClient, QueryState};

/// Fingerprints already emitted, keyed by query client.
///
/// Entries live exactly as long as their client.
#[derive(Debug, Default)]
pub struct DehydrationRegistry {
    emitted: DashMap<Uuid, HashSet<String>>,
}

impl DehydrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients with dehydration history.
    pub fn tracked_clients(&self) -> usize {
        self.emitted.len()
    }

    pub(crate) fn release(&self, client: Uuid) {
        self.emitted.remove(&client);
    }
}

/// Identity of a query's current state.
pub fn fingerprint(query: &Query) -> String {
    format!(
        "{}-{}-{}",
        query.hash, query.state.data_update_count, query.state.error_update_count
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedQuery {
    pub query_key: Vec<Value>,
    pub query_hash: String,
    pub state: QueryState,
}

/// Serializable snapshot sent to the browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DehydratedState {
    pub queries: Vec<DehydratedQuery>,
    pub mutations: Vec<Value>,
}

impl DehydratedState {
    /// JSON safe to embed inside an inline `<script>` element.
    pub fn to_script_json(&self) -> Result<String, serde_json::Error> {
        Ok(escape_script_json(&serde_json::to_string(self)?))
    }
}

fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

impl QueryClient {
    /// Dehydrate every query not already emitted in its current state.
    pub fn dehydrate_once(&self) -> DehydratedState {
        self.dehydrate_once_with(|_| true)
    }

    /// Like [`dehydrate_once`](Self::dehydrate_once), with a filter.
    ///
    /// The fingerprint is recorded before the filter runs, so a query the
    /// filter rejects is not offered again until it changes.
    pub fn dehydrate_once_with(&self, should_dehydrate: impl Fn(&Query) -> bool) -> DehydratedState {
        let mut skipped = 0;
        let queries = self.with_queries(|queries| {
            let mut emitted = self.registry().emitted.entry(self.id()).or_default();
            let mut out = Vec::new();
            for query in queries.values() {
                if !emitted.insert(fingerprint(query)) || !should_dehydrate(query) {
                    skipped += 1;
                    continue;
                }
                out.push(DehydratedQuery {
                    query_key: query.key.parts().to_vec(),
                    query_hash: query.hash.clone(),
                    state: query.state.clone(),
                });
            }
            out
        });

        tracing::debug!(
            client = %self.id(),
            emitted = queries.len(),
            skipped,
            "Dehydrated query cache"
        );
        metrics::record_dehydration(queries.len(), skipped);

        DehydratedState {
            queries,
            mutations: Vec::new(),
        }
    }
}
