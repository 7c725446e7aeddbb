use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// A child of a collection as returned by the store: its generated key and the raw document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    pub key: String,
    pub value: Value,
}

/// Ordered range query: order children of a path by one of their fields and keep the last N.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeQuery {
    pub order_by_child: String,
    pub limit_to_last: usize,
}

impl RangeQuery {
    pub fn last_by(child: &str, limit: usize) -> Self {
        Self {
            order_by_child: child.to_owned(),
            limit_to_last: limit,
        }
    }
}

/// Live snapshots of a query. Every item is the full result set, ascending by the ordering child.
/// The stream ends after yielding an error.
pub type SnapshotStream = BoxStream<'static, Result<Vec<DocumentSnapshot>, StoreError>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("store error: {0}")]
    Backend(String),
}

// Object style note:
// A DocumentStore is a thin client over a hosted, schemaless, tree-structured
// store. It owns no article semantics: callers hand it JSON documents and
// paths, and the store only has to honour the four capabilities below plus the
// server timestamp sentinel (see ServerValue).

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a child of `path` under a freshly generated key and return that key.
    /// Server value sentinels inside `value` are resolved by the store.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Read the document at `path`. `Ok(None)` means the read succeeded and nothing is there.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Children of `path` ordered ascending by `query.order_by_child`, limited to the last N.
    async fn query_last(&self, path: &str, query: &RangeQuery) -> Result<Vec<DocumentSnapshot>, StoreError>;

    /// Live version of `query_last`: yields the current result set, then a new one after every write under `path`.
    async fn watch(&self, path: &str, query: &RangeQuery) -> Result<SnapshotStream, StoreError>;
}

/// Placeholders the store replaces with its own values at write time.
pub struct ServerValue;

impl ServerValue {
    pub const TIMESTAMP_KEY: &'static str = ".sv";
    pub const TIMESTAMP_NAME: &'static str = "timestamp";

    /// `{".sv": "timestamp"}`, resolved to the store clock in milliseconds since the epoch.
    pub fn timestamp() -> Value {
        let mut map = Map::new();
        map.insert(Self::TIMESTAMP_KEY.to_owned(), Value::String(Self::TIMESTAMP_NAME.to_owned()));
        Value::Object(map)
    }

    pub fn is_timestamp(value: &Value) -> bool {
        match value {
            Value::Object(map) => {
                map.len() == 1 && map.get(Self::TIMESTAMP_KEY).and_then(Value::as_str) == Some(Self::TIMESTAMP_NAME)
            }
            _ => false,
        }
    }
}

/// Replace every timestamp sentinel in `value` with `now_ms`. Returns how many were replaced.
pub fn resolve_server_values(value: &mut Value, now_ms: i64) -> usize {
    if ServerValue::is_timestamp(value) {
        *value = Value::from(now_ms);
        return 1;
    }
    match value {
        Value::Object(map) => map.values_mut().map(|child| resolve_server_values(child, now_ms)).sum(),
        Value::Array(items) => items.iter_mut().map(|child| resolve_server_values(child, now_ms)).sum(),
        _ => 0,
    }
}
