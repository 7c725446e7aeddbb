use crate::types::{DocumentSnapshot, DocumentStore, RangeQuery, SnapshotStream, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use interfaces::resolve_server_values;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

fn db_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

/// Split `articles/abc` into `("articles", "abc")`.
fn split_child_path(path: &str) -> Option<(&str, &str)> {
    let (collection, key) = path.trim_matches('/').rsplit_once('/')?;
    if collection.is_empty() || key.is_empty() {
        return None;
    }
    Some((collection, key))
}

fn collection_path(path: &str) -> Result<&str, StoreError> {
    let collection = path.trim_matches('/');
    if collection.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(collection)
}

fn parse_body(key: &str, body: &str) -> Result<Value, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Malformed(format!("{}: {}", key, e)))
}

async fn query_collection(pool: &SqlitePool, collection: &str, query: &RangeQuery) -> Result<Vec<DocumentSnapshot>, StoreError> {
    let json_path = format!("$.{}", query.order_by_child);
    let rows = sqlx::query(
        r#"
        SELECT key, body
        FROM documents
        WHERE collection = ?
        ORDER BY json_extract(body, ?) DESC, key DESC
        LIMIT ?
        "#,
    )
    .bind(collection)
    .bind(json_path)
    .bind(query.limit_to_last as i64)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows.into_iter().rev() {
        let key: String = row.try_get("key").map_err(db_error)?;
        let body: String = row.try_get("body").map_err(db_error)?;
        let value = parse_body(&key, &body)?;
        snapshots.push(DocumentSnapshot { key, value });
    }
    Ok(snapshots)
}

/// Document store kept in a SQLite database.
///
/// Documents are stored as JSON text, one row per child of a collection.
/// Writes are serialized so the server timestamps they receive are strictly
/// increasing, and every write wakes the watchers of its collection.
pub struct SqliteStore {
    pool: SqlitePool,
    last_timestamp: Mutex<i64>,
    changes: broadcast::Sender<String>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .create_if_missing(true);

        // One long-lived connection: an in-memory database only lives as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_error)?;

        let (changes, _) = broadcast::channel(64);
        let store = Self {
            pool,
            last_timestamp: Mutex::new(0),
            changes,
        };
        store.setup_schema().await?;

        let latest: i64 = sqlx::query("SELECT COALESCE(MAX(created_at), 0) AS latest FROM documents")
            .fetch_one(&store.pool)
            .await
            .map_err(db_error)?
            .try_get("latest")
            .map_err(db_error)?;
        *store.last_timestamp.lock().await = latest;

        info!("Opened SQLite article store: {}", database_url);
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    async fn setup_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (collection, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Close the underlying pool. Every later operation fails with `StoreError::Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed SQLite article store");
    }

    fn notify(&self, collection: &str) {
        // No receivers just means nobody is watching.
        let _ = self.changes.send(collection.to_string());
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn push(&self, path: &str, mut value: Value) -> Result<String, StoreError> {
        let collection = collection_path(path)?;
        let key = Uuid::new_v4().simple().to_string();

        {
            let mut last = self.last_timestamp.lock().await;
            let timestamp = Utc::now().timestamp_millis().max(*last + 1);
            resolve_server_values(&mut value, timestamp);

            sqlx::query("INSERT INTO documents (collection, key, body, created_at) VALUES (?, ?, ?, ?)")
                .bind(collection)
                .bind(&key)
                .bind(value.to_string())
                .bind(timestamp)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;

            *last = timestamp;
        }

        debug!("Stored {}/{}", collection, key);
        self.notify(collection);
        Ok(key)
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if let Some((collection, key)) = split_child_path(path) {
            let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND key = ?")
                .bind(collection)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

            return match row {
                Some(row) => {
                    let body: String = row.try_get("body").map_err(db_error)?;
                    Ok(Some(parse_body(key, &body)?))
                }
                None => Ok(None),
            };
        }

        // A bare collection path reads the whole collection as one object.
        let collection = collection_path(path)?;
        let rows = sqlx::query("SELECT key, body FROM documents WHERE collection = ? ORDER BY key")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut children = Map::new();
        for row in rows {
            let key: String = row.try_get("key").map_err(db_error)?;
            let body: String = row.try_get("body").map_err(db_error)?;
            let value = parse_body(&key, &body)?;
            children.insert(key, value);
        }
        Ok(Some(Value::Object(children)))
    }

    async fn query_last(&self, path: &str, query: &RangeQuery) -> Result<Vec<DocumentSnapshot>, StoreError> {
        query_collection(&self.pool, collection_path(path)?, query).await
    }

    async fn watch(&self, path: &str, query: &RangeQuery) -> Result<SnapshotStream, StoreError> {
        let collection = collection_path(path)?.to_string();
        // Subscribe before the first query so no write slips between the two.
        let mut changes = self.changes.subscribe();
        let initial = query_collection(&self.pool, &collection, query).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(Ok(initial));

        let pool = self.pool.clone();
        let query = query.clone();
        tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    _ = sender.closed() => break,
                    change = changes.recv() => change,
                };
                match change {
                    Ok(changed) if changed != collection => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Watcher on {} missed {} change notifications, re-reading", collection, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                let result = query_collection(&pool, &collection, &query).await;
                let failed = result.is_err();
                if sender.send(result).is_err() || failed {
                    break;
                }
            }
            debug!("Watcher on {} stopped", collection);
        });

        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}
