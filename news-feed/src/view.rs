//! Render-ready view models. Markup and styling belong to the rendering surface;
//! everything here is plain data with display defaults already applied.

use crate::article::placeholder;
use crate::types::ArticleRecord;
use serde::Serialize;
use url::{form_urlencoded, Url};

/// Page the homepage links to for a single article.
pub const DETAIL_PAGE: &str = "article.html";
/// Where error notices send the reader back to.
pub const HOME_PAGE: &str = "index.html";

/// Accept an image URL only if it is an absolute http(s) URL with a host.
pub fn is_displayable_image_url(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => (url.scheme() == "http" || url.scheme() == "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// The URL to put in an `<img src>`: the stored one if displayable, the placeholder otherwise.
pub fn display_image_url(raw: Option<&str>) -> String {
    match raw {
        Some(url) if is_displayable_image_url(url) => url.trim().to_string(),
        _ => placeholder::IMAGE_URL.to_string(),
    }
}

/// `article.html?id=<id>` with the id percent-encoded.
pub fn detail_link(detail_page: &str, article_id: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(article_id.as_bytes()).collect();
    format!("{}?id={}", detail_page, encoded)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Prominence {
    Lead,
    Secondary,
}

/// A homepage news card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCard {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub date: String,
    pub image_url: String,
    pub link: String,
    pub prominence: Prominence,
}

impl ArticleCard {
    pub fn from_record(record: &ArticleRecord, prominence: Prominence, detail_page: &str) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            summary: record.summary.clone(),
            category: record.category.to_uppercase(),
            date: record.date.clone(),
            image_url: display_image_url(record.image_url.as_deref()),
            link: detail_link(detail_page, &record.id),
            prominence,
        }
    }
}

/// An entry of the trending sidebar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingLink {
    pub id: String,
    pub title: String,
    pub link: String,
}

impl TrendingLink {
    pub fn from_record(record: &ArticleRecord, detail_page: &str) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            link: detail_link(detail_page, &record.id),
        }
    }
}

/// Everything the detail page shows for one article.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetail {
    pub id: String,
    pub page_title: String,
    pub title: String,
    pub category: String,
    pub author: String,
    pub date: String,
    pub image_url: String,
    pub image_alt: String,
    pub body: String,
}

impl ArticleDetail {
    pub fn from_record(record: &ArticleRecord, site_name: &str) -> Self {
        Self {
            id: record.id.clone(),
            page_title: format!("{} - {}", record.title, site_name),
            title: record.title.clone(),
            category: record.category.to_uppercase(),
            author: record.author.clone(),
            date: record.date.clone(),
            image_url: display_image_url(record.image_url.as_deref()),
            image_alt: format!("Cover image for {}", record.title),
            body: record.body.clone(),
        }
    }
}

/// Shown in place of an article when loading it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub page_title: String,
    pub heading: String,
    pub message: String,
    pub back_link: String,
}

impl ErrorNotice {
    pub fn new(message: impl Into<String>, site_name: &str) -> Self {
        Self {
            page_title: format!("Error - {}", site_name),
            heading: "Loading error".to_string(),
            message: message.into(),
            back_link: HOME_PAGE.to_string(),
        }
    }
}
