mod common;

use common::{doc, memory_connection, next_snapshot, ScriptedStore};
use news_feed::{
    ArticleDraft, DocumentSnapshot, FeedConfig, FeedError, FeedProjection, FeedSnapshot, FeedSubscription, Placeholder,
    PublishPipeline, StoreConnection, StoreError,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn channel_callback() -> (impl FnMut(FeedSnapshot) + Send + 'static, mpsc::UnboundedReceiver<FeedSnapshot>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let callback = move |snapshot: FeedSnapshot| {
        let _ = sender.send(snapshot);
    };
    (callback, receiver)
}

#[tokio::test]
async fn test_empty_collection_shows_placeholders_without_error() -> anyhow::Result<()> {
    let (_store, connection) = memory_connection().await;
    let feed = FeedSubscription::new(connection, FeedConfig::default());

    let (on_snapshot, mut snapshots) = channel_callback();
    let errors = Arc::new(AtomicUsize::new(0));
    let error_count = errors.clone();
    let mut handle = feed
        .subscribe(on_snapshot, move |_| {
            error_count.fetch_add(1, Ordering::SeqCst);
        })
        .await?;

    let snapshot = next_snapshot(&mut snapshots).await;
    assert!(snapshot.articles.is_empty());
    assert_eq!(snapshot.projection.lead.placeholder(), Some(Placeholder::NoLead));
    assert_eq!(snapshot.projection.secondary.placeholder(), Some(Placeholder::NoSecondary));
    assert_eq!(snapshot.projection.trending.placeholder(), Some(Placeholder::NoTrending));
    assert!(Placeholder::NoLead.message().to_lowercase().contains("no primary news"));
    assert!(Placeholder::NoTrending.message().to_lowercase().contains("no recent articles"));

    handle.unsubscribe().await;
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_publishing_triggers_a_new_snapshot() -> anyhow::Result<()> {
    let (_store, connection) = memory_connection().await;
    let feed = FeedSubscription::new(connection.clone(), FeedConfig::default());
    let pipeline = PublishPipeline::new(connection, FeedConfig::default());

    let (on_snapshot, mut snapshots) = channel_callback();
    let mut handle = feed.subscribe(on_snapshot, |_| {}).await?;
    assert!(next_snapshot(&mut snapshots).await.articles.is_empty());

    let id = pipeline.publish(ArticleDraft::titled("Breaking")).await?;
    let snapshot = next_snapshot(&mut snapshots).await;
    let lead = snapshot.projection.lead.content().expect("lead card");
    assert_eq!(lead.id, id);
    assert_eq!(lead.title, "Breaking");
    assert_eq!(snapshot.projection.secondary.placeholder(), Some(Placeholder::OnlyLead));

    handle.unsubscribe().await;
    Ok(())
}

#[tokio::test]
async fn test_feed_is_newest_first_and_partitioned() -> anyhow::Result<()> {
    let (_store, connection) = memory_connection().await;
    let pipeline = PublishPipeline::new(connection.clone(), FeedConfig::default());
    for n in 1..=7 {
        pipeline.publish(ArticleDraft::titled(format!("story {}", n))).await?;
    }

    let feed = FeedSubscription::new(connection, FeedConfig::default());
    let articles = feed.fetch_once().await?;
    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["story 7", "story 6", "story 5", "story 4", "story 3", "story 2", "story 1"]);
    assert!(articles.windows(2).all(|pair| pair[0].timestamp > pair[1].timestamp));

    let projection = feed.load_projection().await;
    assert_eq!(projection.lead.content().map(|c| c.title.as_str()), Some("story 7"));
    let secondary: Vec<&str> = projection.secondary.content().unwrap().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(secondary, vec!["story 6", "story 5", "story 4"]);
    let trending: Vec<&str> = projection.trending.content().unwrap().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(trending, vec!["story 7", "story 6", "story 5", "story 4", "story 3"]);
    Ok(())
}

#[tokio::test]
async fn test_feed_limit_is_configurable() -> anyhow::Result<()> {
    let (_store, connection) = memory_connection().await;
    let pipeline = PublishPipeline::new(connection.clone(), FeedConfig::default());
    for n in 1..=6 {
        pipeline.publish(ArticleDraft::titled(format!("story {}", n))).await?;
    }

    let feed = FeedSubscription::new(connection, FeedConfig::default().with_feed_limit(4));
    let articles = feed.fetch_once().await?;
    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["story 6", "story 5", "story 4", "story 3"]);
    Ok(())
}

#[tokio::test]
async fn test_store_order_is_reversed_before_projection() -> anyhow::Result<()> {
    common::init_tracing();
    let ascending = vec![doc("a", "oldest", 100), doc("b", "middle", 200), doc("c", "newest", 300)];
    let store = Arc::new(ScriptedStore::delivering(vec![Ok(ascending)]));
    let feed = FeedSubscription::new(Arc::new(StoreConnection::ready(store)), FeedConfig::default());

    let (on_snapshot, mut snapshots) = channel_callback();
    let _handle = feed.subscribe(on_snapshot, |_| {}).await?;
    let snapshot = next_snapshot(&mut snapshots).await;
    let ids: Vec<&str> = snapshot.articles.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
    assert_eq!(snapshot.projection.lead.content().map(|c| c.id.as_str()), Some("c"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_children_are_skipped() -> anyhow::Result<()> {
    common::init_tracing();
    let delivery = vec![
        doc("a", "kept", 100),
        DocumentSnapshot { key: "junk".into(), value: json!("not an article") },
    ];
    let store = Arc::new(ScriptedStore::delivering(vec![Ok(delivery)]));
    let feed = FeedSubscription::new(Arc::new(StoreConnection::ready(store)), FeedConfig::default());

    let articles = feed.fetch_once().await?;
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].id, "a");
    Ok(())
}

#[tokio::test]
async fn test_delivery_error_fires_once_and_ends_the_subscription() -> anyhow::Result<()> {
    common::init_tracing();
    let store = Arc::new(ScriptedStore::delivering(vec![
        Ok(vec![doc("a", "first", 1)]),
        Err(StoreError::PermissionDenied("rules changed".into())),
        Ok(vec![doc("b", "never delivered", 2)]),
    ]));
    let feed = FeedSubscription::new(Arc::new(StoreConnection::ready(store)), FeedConfig::default());

    let (on_snapshot, mut snapshots) = channel_callback();
    let (error_sender, mut errors) = mpsc::unbounded_channel();
    let mut handle = feed
        .subscribe(on_snapshot, move |e| {
            let _ = error_sender.send(e);
        })
        .await?;

    assert_eq!(next_snapshot(&mut snapshots).await.articles[0].id, "a");
    let error = tokio::time::timeout(Duration::from_secs(5), errors.recv()).await?.expect("error delivered");
    assert!(matches!(error, FeedError::ReadFailed(StoreError::PermissionDenied(_))));

    // The task ended after the error, dropping both callbacks.
    assert!(tokio::time::timeout(Duration::from_secs(5), snapshots.recv()).await?.is_none());
    assert!(errors.recv().await.is_none());
    handle.unsubscribe().await;
    assert!(!handle.is_active());
    Ok(())
}

#[tokio::test]
async fn test_unsubscribe_is_final_and_idempotent() -> anyhow::Result<()> {
    let (_store, connection) = memory_connection().await;
    let feed = FeedSubscription::new(connection.clone(), FeedConfig::default());
    let pipeline = PublishPipeline::new(connection, FeedConfig::default());

    let (on_snapshot, mut snapshots) = channel_callback();
    let mut handle = feed.subscribe(on_snapshot, |_| {}).await?;
    next_snapshot(&mut snapshots).await;

    feed.unsubscribe(&mut handle).await;
    assert!(!handle.is_active());
    feed.unsubscribe(&mut handle).await;

    pipeline.publish(ArticleDraft::titled("after teardown")).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The callback (and its sender) is gone, so only pre-teardown deliveries can remain.
    while let Some(snapshot) = snapshots.recv().await {
        assert!(snapshot.articles.iter().all(|a| a.title != "after teardown"));
    }
    Ok(())
}

#[tokio::test]
async fn test_panicking_callback_does_not_break_unsubscribe() -> anyhow::Result<()> {
    common::init_tracing();
    let store = Arc::new(ScriptedStore::delivering(vec![Ok(vec![doc("a", "boom", 1)])]));
    let feed = FeedSubscription::new(Arc::new(StoreConnection::ready(store)), FeedConfig::default());

    let mut handle = feed.subscribe(|_| panic!("render failed"), |_| {}).await?;
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.is_active() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    feed.unsubscribe(&mut handle).await;
    assert!(!handle.is_active());
    Ok(())
}

#[tokio::test]
async fn test_missing_connection_fails_fast() {
    common::init_tracing();
    let feed = FeedSubscription::new(Arc::new(StoreConnection::uninitialized()), FeedConfig::default());

    let subscribed = feed.subscribe(|_| panic!("no snapshot expected"), |_| panic!("no error expected")).await;
    assert!(matches!(subscribed, Err(FeedError::NotConnected)));
    assert!(matches!(feed.fetch_once().await, Err(FeedError::NotConnected)));
    assert_eq!(feed.load_projection().await, FeedProjection::unreachable());
}

#[tokio::test]
async fn test_failing_store_reports_read_failure() {
    common::init_tracing();
    let store = Arc::new(ScriptedStore::failing(StoreError::Unavailable("offline".into())));
    let feed = FeedSubscription::new(Arc::new(StoreConnection::ready(store.clone())), FeedConfig::default());

    let subscribed = feed.subscribe(|_| {}, |_| {}).await;
    assert!(matches!(subscribed, Err(FeedError::ReadFailed(StoreError::Unavailable(_)))));

    let projection = feed.load_projection().await;
    assert_eq!(projection.lead.placeholder(), Some(Placeholder::StoreUnreachable));
    assert_eq!(store.calls(), 2, "no retry");
}
