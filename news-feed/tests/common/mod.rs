#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use news_feed::{
    DocumentSnapshot, DocumentStore, FeedSnapshot, RangeQuery, SnapshotStream, SqliteStore, StoreConnection, StoreError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::mpsc;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A fresh in-memory SQLite store and a ready connection to it.
pub async fn memory_connection() -> (Arc<SqliteStore>, Arc<StoreConnection>) {
    init_tracing();
    let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
    let connection = Arc::new(StoreConnection::ready(store.clone()));
    (store, connection)
}

pub fn doc(key: &str, title: &str, timestamp: i64) -> DocumentSnapshot {
    DocumentSnapshot {
        key: key.to_string(),
        value: json!({ "title": title, "timestamp": timestamp, "date": "01-01-2026" }),
    }
}

pub async fn next_snapshot(receiver: &mut mpsc::UnboundedReceiver<FeedSnapshot>) -> FeedSnapshot {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out waiting for a feed snapshot")
        .expect("subscription ended before delivering a snapshot")
}

/// Store with canned behaviour: either every call fails with `error`, or
/// `watch` replays `deliveries` and then stays open.
pub struct ScriptedStore {
    error: Option<StoreError>,
    deliveries: Mutex<Vec<Result<Vec<DocumentSnapshot>, StoreError>>>,
    document: Option<Value>,
    calls: AtomicUsize,
}

impl ScriptedStore {
    pub fn failing(error: StoreError) -> Self {
        Self {
            error: Some(error),
            deliveries: Mutex::new(Vec::new()),
            document: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delivering(deliveries: Vec<Result<Vec<DocumentSnapshot>, StoreError>>) -> Self {
        Self {
            error: None,
            deliveries: Mutex::new(deliveries),
            document: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn holding(document: Value) -> Self {
        Self {
            error: None,
            deliveries: Mutex::new(Vec::new()),
            document: Some(document),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn push(&self, _path: &str, _value: Value) -> Result<String, StoreError> {
        self.record_call()?;
        Ok("scripted-id".to_string())
    }

    async fn get(&self, _path: &str) -> Result<Option<Value>, StoreError> {
        self.record_call()?;
        Ok(self.document.clone())
    }

    async fn query_last(&self, _path: &str, _query: &RangeQuery) -> Result<Vec<DocumentSnapshot>, StoreError> {
        self.record_call()?;
        let deliveries = self.deliveries.lock().unwrap();
        match deliveries.first() {
            Some(first) => first.clone(),
            None => Ok(Vec::new()),
        }
    }

    async fn watch(&self, _path: &str, _query: &RangeQuery) -> Result<SnapshotStream, StoreError> {
        self.record_call()?;
        let deliveries = std::mem::take(&mut *self.deliveries.lock().unwrap());
        Ok(futures::stream::iter(deliveries).chain(futures::stream::pending()).boxed())
    }
}
