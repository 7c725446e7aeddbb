use crate::article::{display_date, normalize_draft};
use crate::config::FeedConfig;
use crate::connection::StoreConnection;
use crate::types::{ArticleDraft, DocumentStore, PublishError, StoreError};
use chrono::Local;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// The admin control that triggers a publish (typically its submit button).
pub trait BusyControl: Send + Sync {
    fn set_busy(&self, busy: bool);
}

/// Marks a control busy for as long as the guard lives.
///
/// Released in `Drop`, including when the publish future is dropped before
/// it completes.
pub struct BusyGuard<'a> {
    control: &'a dyn BusyControl,
}

impl<'a> BusyGuard<'a> {
    pub fn acquire(control: &'a dyn BusyControl) -> Self {
        control.set_busy(true);
        Self { control }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.control.set_busy(false);
    }
}

/// A `BusyControl` that just records its state.
#[derive(Debug, Default)]
pub struct BusyFlag {
    busy: AtomicBool,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl BusyControl for BusyFlag {
    fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
        let counter = if busy { &self.acquisitions } else { &self.releases };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Status line shown on the admin page after a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Success(String),
    Error(String),
}

impl StatusMessage {
    pub fn from_result(result: &Result<String, PublishError>) -> Self {
        match result {
            Ok(_) => StatusMessage::Success("Article published.".to_string()),
            Err(PublishError::NotConnected) => {
                StatusMessage::Error("Database not connected. Check the store configuration.".to_string())
            }
            Err(PublishError::WriteFailed(e)) => StatusMessage::Error(format!("Publication failed: {}", e)),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StatusMessage::Error(_))
    }

    pub fn text(&self) -> &str {
        match self {
            StatusMessage::Success(text) | StatusMessage::Error(text) => text,
        }
    }
}

/// Normalizes drafts and writes them to the article collection.
pub struct PublishPipeline {
    connection: Arc<StoreConnection>,
    config: FeedConfig,
}

impl PublishPipeline {
    pub fn new(connection: Arc<StoreConnection>, config: FeedConfig) -> Self {
        Self { connection, config }
    }

    /// Write one article and return the id the store generated for it.
    ///
    /// The article becomes visible through the next feed snapshot, not
    /// synchronously. Nothing is retried.
    pub async fn publish(&self, draft: ArticleDraft) -> Result<String, PublishError> {
        let store = self.connection.store().ok_or(PublishError::NotConnected)?;
        self.write(store.as_ref(), draft).await
    }

    /// Like `publish`, holding `control` busy for the duration of the write.
    pub async fn publish_guarded(&self, draft: ArticleDraft, control: &dyn BusyControl) -> Result<String, PublishError> {
        let store = self.connection.store().ok_or(PublishError::NotConnected)?;
        let _busy = BusyGuard::acquire(control);
        self.write(store.as_ref(), draft).await
    }

    async fn write(&self, store: &dyn DocumentStore, draft: ArticleDraft) -> Result<String, PublishError> {
        let date = display_date(&Local::now(), &self.config.date_format);
        let article = normalize_draft(draft, date);
        let document = serde_json::to_value(&article).map_err(|e| StoreError::Malformed(e.to_string()))?;

        match store.push(&self.config.collection, document).await {
            Ok(id) => {
                info!("Published article {} ({})", id, article.title);
                Ok(id)
            }
            Err(e) => {
                error!("Failed to publish article '{}': {}", article.title, e);
                Err(PublishError::WriteFailed(e))
            }
        }
    }
}
