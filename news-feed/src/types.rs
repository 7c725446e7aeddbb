use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use interfaces::defs::{DocumentSnapshot, DocumentStore, RangeQuery, ServerValue, SnapshotStream, StoreError};

/// Field the feed is ordered by.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// An article as read back from the store, with read-side defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub category: String,
    pub author: String,
    /// Raw and untrusted; see `view::display_image_url`.
    pub image_url: Option<String>,
    pub date: String,
    pub timestamp: i64,
}

/// Unvalidated payload from the admin form. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleDraft {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
}

impl ArticleDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Normalized document as written to the `articles` collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub category: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub date: String,
    /// Always the server timestamp sentinel; the store fills in its own clock.
    pub timestamp: Value,
}

/// Result of looking up a single article.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Found(ArticleRecord),
    /// The read succeeded but nothing is stored under that id.
    NotFound,
    /// The store could not be reached or refused the read.
    ConnectionError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("article store is not connected")]
    NotConnected,

    #[error("failed to write article: {0}")]
    WriteFailed(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("article store is not connected")]
    NotConnected,

    #[error("failed to read articles: {0}")]
    ReadFailed(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported store url: {0}")]
    UnsupportedStore(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}
