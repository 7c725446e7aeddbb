use crate::article::DATE_FORMAT;
use crate::types::ConfigError;
use crate::view::DETAIL_PAGE;
use std::env;
use url::Url;

pub const DEFAULT_COLLECTION: &str = "articles";
pub const DEFAULT_STORE_URL: &str = "sqlite://news.db?mode=rwc";
pub const DEFAULT_SITE_NAME: &str = "Mikuba TV";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Collection path articles live under.
    pub collection: String,
    /// How many of the most recent articles the homepage subscribes to.
    pub feed_limit: usize,
    pub secondary_count: usize,
    pub trending_count: usize,
    pub date_format: String,
    pub site_name: String,
    pub detail_page: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            feed_limit: 10,
            secondary_count: 3,
            trending_count: 5,
            date_format: DATE_FORMAT.to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            detail_page: DETAIL_PAGE.to_string(),
        }
    }
}

impl FeedConfig {
    pub fn with_feed_limit(mut self, feed_limit: usize) -> Self {
        self.feed_limit = feed_limit;
        self
    }
}

/// Which backend holds the articles.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    /// `sqlite://path`, `sqlite:path` or `sqlite::memory:`.
    Sqlite { url: String },
    /// Realtime-database style REST endpoint, e.g. `https://project.firebaseio.com`.
    Rest { base_url: Url, auth: Option<String> },
}

impl StoreConfig {
    pub fn parse(store_url: &str, auth: Option<String>) -> Result<Self, ConfigError> {
        let store_url = store_url.trim();
        if store_url.starts_with("sqlite:") {
            return Ok(StoreConfig::Sqlite { url: store_url.to_string() });
        }

        let base_url = Url::parse(store_url)?;
        match base_url.scheme() {
            "http" | "https" => Ok(StoreConfig::Rest { base_url, auth }),
            _ => Err(ConfigError::UnsupportedStore(store_url.to_string())),
        }
    }

    /// Connection string safe to log.
    pub fn redacted(&self) -> String {
        match self {
            StoreConfig::Sqlite { url } => url.clone(),
            StoreConfig::Rest { base_url, auth } => match auth {
                Some(_) => format!("{} (auth: ***)", base_url),
                None => base_url.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Read `NEWS_STORE_URL`, `NEWS_STORE_AUTH`, `NEWS_FEED_LIMIT` and `NEWS_SITE_NAME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_url = lookup("NEWS_STORE_URL").unwrap_or_else(|| DEFAULT_STORE_URL.to_string());
        let auth = lookup("NEWS_STORE_AUTH").filter(|token| !token.is_empty());
        let store = StoreConfig::parse(&store_url, auth)?;

        let mut feed = FeedConfig::default();
        if let Some(raw) = lookup("NEWS_FEED_LIMIT") {
            feed.feed_limit = parse_limit("NEWS_FEED_LIMIT", &raw)?;
        }
        if let Some(site_name) = lookup("NEWS_SITE_NAME") {
            feed.site_name = site_name;
        }

        Ok(Self { store, feed })
    }
}

/// A positive article count.
pub fn parse_limit(name: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
