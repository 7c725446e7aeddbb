use crate::config::FeedConfig;
use crate::connection::StoreConnection;
use crate::projector::{order_newest_first, FeedProjection, FeedProjector};
use crate::types::{ArticleRecord, DocumentSnapshot, FeedError, RangeQuery, TIMESTAMP_FIELD};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One delivery of the live feed: the ordered articles and the homepage derived from them.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// Newest first.
    pub articles: Vec<ArticleRecord>,
    pub projection: FeedProjection,
}

/// Turn a store snapshot (ascending by timestamp) into newest-first records.
pub fn records_from_snapshot(documents: Vec<DocumentSnapshot>) -> Vec<ArticleRecord> {
    let records = documents
        .into_iter()
        .filter_map(|doc| {
            let record = ArticleRecord::from_document(&doc.key, &doc.value);
            if record.is_none() {
                warn!("Skipping article {}: stored value is not an object", doc.key);
            }
            record
        })
        .collect();
    order_newest_first(records)
}

/// Handle to a live subscription.
///
/// Dropping it cancels the subscription as well, but only `unsubscribe`
/// waits for the delivery task to finish.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Stop deliveries. Once this returns no callback is running or will run.
    /// Calling it again is a no-op.
    pub async fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Resolves once the task has stopped, whether it was cancelled or had already ended.
            match task.await {
                Err(e) if e.is_panic() => error!("Feed subscription callback panicked: {}", e),
                _ => debug!("Feed subscription cancelled"),
            }
        }
    }

    /// True while the store can still deliver snapshots or an error.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Subscribes to the most recent articles and re-projects the homepage on every change.
pub struct FeedSubscription {
    connection: Arc<StoreConnection>,
    config: FeedConfig,
    projector: FeedProjector,
}

impl FeedSubscription {
    pub fn new(connection: Arc<StoreConnection>, config: FeedConfig) -> Self {
        let projector = FeedProjector::new(&config);
        Self {
            connection,
            config,
            projector,
        }
    }

    fn query(&self) -> RangeQuery {
        RangeQuery::last_by(TIMESTAMP_FIELD, self.config.feed_limit)
    }

    /// Start a live subscription.
    ///
    /// `on_snapshot` receives every full snapshot; consumers should treat each
    /// one as a replacement of the previous. `on_error` runs at most once, after
    /// which the subscription is over; nothing is retried.
    pub async fn subscribe<S, E>(&self, mut on_snapshot: S, on_error: E) -> Result<SubscriptionHandle, FeedError>
    where
        S: FnMut(FeedSnapshot) + Send + 'static,
        E: FnOnce(FeedError) + Send + 'static,
    {
        let store = self.connection.store().ok_or(FeedError::NotConnected)?;
        let mut snapshots = store.watch(&self.config.collection, &self.query()).await?;
        let projector = self.projector.clone();
        let collection = self.config.collection.clone();

        info!("Subscribed to the {} most recent articles in {}", self.config.feed_limit, collection);

        let task = tokio::spawn(async move {
            while let Some(delivery) = snapshots.next().await {
                match delivery {
                    Ok(documents) => {
                        let articles = records_from_snapshot(documents);
                        debug!("Feed snapshot with {} articles", articles.len());
                        let projection = projector.project(&articles);
                        on_snapshot(FeedSnapshot { articles, projection });
                    }
                    Err(e) => {
                        warn!("Feed subscription on {} failed: {}", collection, e);
                        on_error(FeedError::ReadFailed(e));
                        return;
                    }
                }
            }
            debug!("Feed stream on {} ended", collection);
        });

        Ok(SubscriptionHandle { task: Some(task) })
    }

    /// Same as `handle.unsubscribe()`.
    pub async fn unsubscribe(&self, handle: &mut SubscriptionHandle) {
        handle.unsubscribe().await;
    }

    /// Read the most recent articles once, newest first.
    pub async fn fetch_once(&self) -> Result<Vec<ArticleRecord>, FeedError> {
        let store = self.connection.store().ok_or(FeedError::NotConnected)?;
        let documents = store.query_last(&self.config.collection, &self.query()).await?;
        Ok(records_from_snapshot(documents))
    }

    /// One-shot homepage. Falls back to the "store unreachable" placeholders on error.
    pub async fn load_projection(&self) -> FeedProjection {
        match self.fetch_once().await {
            Ok(articles) => self.projector.project(&articles),
            Err(e) => {
                warn!("Could not load the feed: {}", e);
                FeedProjection::unreachable()
            }
        }
    }
}
