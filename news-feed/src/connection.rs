use crate::backends::{RestStore, SqliteStore};
use crate::config::StoreConfig;
use crate::types::DocumentStore;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Lifecycle of the process-wide store connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Ready,
    Failed(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Uninitialized => write!(f, "uninitialized"),
            ConnectionState::Ready => write!(f, "ready"),
            ConnectionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

enum Inner {
    Uninitialized,
    Ready(Arc<dyn DocumentStore>),
    Failed(String),
}

/// Shared handle to the article store.
///
/// Built once at startup and never changed afterwards; components receive it
/// as an `Arc<StoreConnection>` and check `store()` at every entry point, so an
/// uninitialized or failed connection surfaces as `NotConnected` up front.
pub struct StoreConnection {
    inner: Inner,
}

impl StoreConnection {
    pub fn uninitialized() -> Self {
        Self { inner: Inner::Uninitialized }
    }

    pub fn ready(store: Arc<dyn DocumentStore>) -> Self {
        Self { inner: Inner::Ready(store) }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self { inner: Inner::Failed(reason.into()) }
    }

    /// Open the configured backend. Never errors: a failure is recorded as `Failed`.
    pub async fn connect(config: &StoreConfig) -> Self {
        let opened: Result<Arc<dyn DocumentStore>, _> = match config {
            StoreConfig::Sqlite { url } => SqliteStore::connect(url).await.map(|s| Arc::new(s) as Arc<dyn DocumentStore>),
            StoreConfig::Rest { base_url, auth } => {
                RestStore::new(base_url.clone(), auth.clone()).map(|s| Arc::new(s) as Arc<dyn DocumentStore>)
            }
        };

        match opened {
            Ok(store) => {
                info!("Article store connected: {}", config.redacted());
                Self::ready(store)
            }
            Err(e) => {
                error!("Article store initialization failed ({}): {}", config.redacted(), e);
                Self::failed(e.to_string())
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &self.inner {
            Inner::Uninitialized => ConnectionState::Uninitialized,
            Inner::Ready(_) => ConnectionState::Ready,
            Inner::Failed(reason) => ConnectionState::Failed(reason.clone()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.inner, Inner::Ready(_))
    }

    /// The store, if the connection is `Ready`.
    pub fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        match &self.inner {
            Inner::Ready(store) => Some(store.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnection").field("state", &self.state()).finish()
    }
}
