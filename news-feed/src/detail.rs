use crate::config::FeedConfig;
use crate::connection::StoreConnection;
use crate::types::{ArticleRecord, DetailOutcome};
use crate::view::{ArticleDetail, ErrorNotice};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Characters the store does not allow in a key.
const RESERVED_KEY_CHARS: &[char] = &['.', '#', '$', '[', ']', '/'];

/// Whether `id` can name a single child of the collection.
pub fn is_valid_article_id(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains(RESERVED_KEY_CHARS) && !id.chars().any(char::is_control)
}

/// Fetches single articles for the detail page.
pub struct ArticleDetailLoader {
    connection: Arc<StoreConnection>,
    config: FeedConfig,
}

impl ArticleDetailLoader {
    pub fn new(connection: Arc<StoreConnection>, config: FeedConfig) -> Self {
        Self { connection, config }
    }

    /// Look up `articles/{article_id}`.
    ///
    /// `NotFound` means the store answered and there is nothing under that id;
    /// `ConnectionError` means it could not answer.
    pub async fn load(&self, article_id: &str) -> DetailOutcome {
        let Some(store) = self.connection.store() else {
            return DetailOutcome::ConnectionError("article store is not connected".to_string());
        };

        // Anything else would address a different node than a single article.
        if !is_valid_article_id(article_id) {
            warn!("Rejected article id {:?}", article_id);
            return DetailOutcome::NotFound;
        }

        let path = format!("{}/{}", self.config.collection, article_id);
        match store.get(&path).await {
            Ok(None) | Ok(Some(Value::Null)) => {
                info!("Article {} not found", article_id);
                DetailOutcome::NotFound
            }
            Ok(Some(value)) => match ArticleRecord::from_document(article_id, &value) {
                Some(record) => DetailOutcome::Found(record),
                None => {
                    warn!("Article {} is not an object, treating as missing", article_id);
                    DetailOutcome::NotFound
                }
            },
            Err(e) => {
                error!("Failed to load article {}: {}", article_id, e);
                DetailOutcome::ConnectionError(e.to_string())
            }
        }
    }

    /// Load and resolve the whole detail page.
    pub async fn load_page(&self, article_id: &str) -> DetailPage {
        let page = DetailPage::loading(&self.config.site_name);
        let outcome = self.load(article_id).await;
        page.resolve(article_id, outcome, &self.config.site_name)
    }
}

/// State of the detail page. Resolving consumes the `Loading` state, so the
/// loading indicator cannot outlive the result.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailPage {
    Loading { page_title: String },
    Loaded(ArticleDetail),
    Failed(ErrorNotice),
}

impl DetailPage {
    pub fn loading(site_name: &str) -> Self {
        DetailPage::Loading {
            page_title: format!("Loading - {}", site_name),
        }
    }

    pub fn resolve(self, article_id: &str, outcome: DetailOutcome, site_name: &str) -> Self {
        match outcome {
            DetailOutcome::Found(record) => DetailPage::Loaded(ArticleDetail::from_record(&record, site_name)),
            DetailOutcome::NotFound => DetailPage::Failed(ErrorNotice::new(
                format!("Article with id '{}' was not found.", article_id),
                site_name,
            )),
            DetailOutcome::ConnectionError(_) => {
                DetailPage::Failed(ErrorNotice::new("Could not connect to the article database.", site_name))
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DetailPage::Loading { .. })
    }

    pub fn page_title(&self) -> &str {
        match self {
            DetailPage::Loading { page_title } => page_title,
            DetailPage::Loaded(detail) => &detail.page_title,
            DetailPage::Failed(notice) => &notice.page_title,
        }
    }
}
