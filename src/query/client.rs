//! Per-request query cache.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::query::dehydrate::DehydrationRegistry;

/// Structured identity of a cached query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    pub fn new(parts: impl IntoIterator<Item = Value>) -> Self {
        Self(parts.into_iter().collect())
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    /// Stable hash of the key: its JSON text with object keys sorted.
    pub fn hash(&self) -> String {
        let canonical = Value::Array(self.0.iter().map(canonicalize).collect());
        canonical.to_string()
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts.into_iter().map(Value::from))
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key.clone(), canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// Observable state of one cached query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub data: Option<Value>,
    pub error: Option<Value>,
    pub data_update_count: u64,
    pub error_update_count: u64,
    /// Milliseconds since the Unix epoch; zero when never updated.
    pub data_updated_at: u64,
    pub error_updated_at: u64,
    pub status: QueryStatus,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            data_update_count: 0,
            error_update_count: 0,
            data_updated_at: 0,
            error_updated_at: 0,
            status: QueryStatus::Pending,
        }
    }
}

/// One entry in the cache.
#[derive(Debug, Clone)]
pub struct Query {
    pub key: QueryKey,
    pub hash: String,
    pub state: QueryState,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

struct Inner {
    id: Uuid,
    queries: Mutex<BTreeMap<String, Query>>,
    registry: Arc<DehydrationRegistry>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// Query cache scoped to a single request.
///
/// Clones share the same cache. When the last clone is dropped the client's
/// dehydration history is released from the registry.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    pub fn new(registry: Arc<DehydrationRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                queries: Mutex::new(BTreeMap::new()),
                registry,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub(crate) fn registry(&self) -> &DehydrationRegistry {
        &self.inner.registry
    }

    pub(crate) fn with_queries<R>(&self, f: impl FnOnce(&BTreeMap<String, Query>) -> R) -> R {
        f(&self.inner.queries.lock().expect("query cache mutex poisoned"))
    }

    fn update(&self, key: &QueryKey, f: impl FnOnce(&mut QueryState)) {
        let hash = key.hash();
        let mut queries = self.inner.queries.lock().expect("query cache mutex poisoned");
        let query = queries.entry(hash.clone()).or_insert_with(|| Query {
            key: key.clone(),
            hash,
            state: QueryState::default(),
        });
        f(&mut query.state);
    }

    /// Cached data for `key`, if any has been stored.
    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        let queries = self.inner.queries.lock().expect("query cache mutex poisoned");
        queries.get(&key.hash()).and_then(|q| q.state.data.clone())
    }

    pub fn get_query_state(&self, key: &QueryKey) -> Option<QueryState> {
        let queries = self.inner.queries.lock().expect("query cache mutex poisoned");
        queries.get(&key.hash()).map(|q| q.state.clone())
    }

    /// Store `data` as a successful result for `key`.
    pub fn set_query_data(&self, key: &QueryKey, data: Value) {
        self.update(key, |state| {
            state.data = Some(data);
            state.error = None;
            state.data_update_count += 1;
            state.data_updated_at = now_millis();
            state.status = QueryStatus::Success;
        });
    }

    /// Record a failed fetch for `key`. Previously cached data is kept.
    pub fn set_query_error(&self, key: &QueryKey, error: Value) {
        self.update(key, |state| {
            state.error = Some(error);
            state.error_update_count += 1;
            state.error_updated_at = now_millis();
            state.status = QueryStatus::Error;
        });
    }

    /// Return cached data for `key`, fetching and caching it when absent.
    pub async fn ensure_query_data<F, Fut, E>(&self, key: &QueryKey, fetch: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: fmt::Display,
    {
        if let Some(data) = self.get_query_data(key) {
            return Ok(data);
        }
        match fetch().await {
            Ok(data) => {
                self.set_query_data(key, data.clone());
                Ok(data)
            }
            Err(err) => {
                self.set_query_error(key, Value::String(err.to_string()));
                Err(err)
            }
        }
    }
}
