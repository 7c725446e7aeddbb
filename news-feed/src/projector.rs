use crate::config::FeedConfig;
use crate::types::ArticleRecord;
use crate::view::{ArticleCard, Prominence, TrendingLink, DETAIL_PAGE};
use serde::Serialize;
use std::fmt;

/// What to show when a homepage section has nothing to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    NoLead,
    NoSecondary,
    /// Exactly one article exists: it is the lead, so nothing is left for the secondary grid.
    OnlyLead,
    NoTrending,
    StoreUnreachable,
}

impl Placeholder {
    pub fn message(&self) -> &'static str {
        match self {
            Placeholder::NoLead => "No primary news. Add articles from the admin page.",
            Placeholder::NoSecondary => "No articles available.",
            Placeholder::OnlyLead => "Only a lead article is available.",
            Placeholder::NoTrending => "No recent articles to display.",
            Placeholder::StoreUnreachable => "The news database could not be reached.",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One homepage section: either content or a placeholder, never blank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section<T> {
    Filled(T),
    Empty(Placeholder),
}

impl<T> Section<T> {
    pub fn content(&self) -> Option<&T> {
        match self {
            Section::Filled(content) => Some(content),
            Section::Empty(_) => None,
        }
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        match self {
            Section::Filled(_) => None,
            Section::Empty(placeholder) => Some(*placeholder),
        }
    }
}

/// The homepage derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedProjection {
    pub lead: Section<ArticleCard>,
    pub secondary: Section<Vec<ArticleCard>>,
    pub trending: Section<Vec<TrendingLink>>,
}

impl FeedProjection {
    /// Every section replaced by the "store unreachable" notice.
    pub fn unreachable() -> Self {
        Self {
            lead: Section::Empty(Placeholder::StoreUnreachable),
            secondary: Section::Empty(Placeholder::StoreUnreachable),
            trending: Section::Empty(Placeholder::StoreUnreachable),
        }
    }
}

/// Order records most recent first.
///
/// The input is expected in store order (ascending); it is reversed and then
/// stably sorted by timestamp, so the result depends only on timestamps and,
/// for equal timestamps, on the input order.
pub fn order_newest_first(mut records: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    records.reverse();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// Splits a newest-first article list into lead, secondary and trending sections.
#[derive(Debug, Clone)]
pub struct FeedProjector {
    secondary_count: usize,
    trending_count: usize,
    detail_page: String,
}

impl Default for FeedProjector {
    fn default() -> Self {
        Self {
            secondary_count: 3,
            trending_count: 5,
            detail_page: DETAIL_PAGE.to_string(),
        }
    }
}

impl FeedProjector {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            secondary_count: config.secondary_count,
            trending_count: config.trending_count,
            detail_page: config.detail_page.clone(),
        }
    }

    /// `articles` must already be newest first (see `order_newest_first`).
    pub fn project(&self, articles: &[ArticleRecord]) -> FeedProjection {
        let lead = match articles.first() {
            Some(record) => Section::Filled(ArticleCard::from_record(record, Prominence::Lead, &self.detail_page)),
            None => Section::Empty(Placeholder::NoLead),
        };

        let secondary_cards: Vec<ArticleCard> = articles
            .iter()
            .skip(1)
            .take(self.secondary_count)
            .map(|record| ArticleCard::from_record(record, Prominence::Secondary, &self.detail_page))
            .collect();
        let secondary = if !secondary_cards.is_empty() {
            Section::Filled(secondary_cards)
        } else if articles.is_empty() {
            Section::Empty(Placeholder::NoSecondary)
        } else {
            Section::Empty(Placeholder::OnlyLead)
        };

        // Trending overlaps lead and secondary; it is its own view of the top of the feed.
        let trending_links: Vec<TrendingLink> = articles
            .iter()
            .take(self.trending_count)
            .map(|record| TrendingLink::from_record(record, &self.detail_page))
            .collect();
        let trending = if trending_links.is_empty() {
            Section::Empty(Placeholder::NoTrending)
        } else {
            Section::Filled(trending_links)
        };

        FeedProjection { lead, secondary, trending }
    }
}
