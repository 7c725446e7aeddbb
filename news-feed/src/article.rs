use crate::types::{ArticleDraft, ArticleRecord, NewArticle, ServerValue, TIMESTAMP_FIELD};
use chrono::{DateTime, TimeZone};
use serde_json::{Map, Value};
use std::fmt::Display;
use tracing::debug;

/// Fixed stand-ins for missing article fields, shared by the write and read paths.
pub mod placeholder {
    pub const TITLE: &str = "Untitled article";
    pub const SUMMARY: &str = "Summary not available.";
    pub const BODY: &str = "<p>The full body of this article is not available.</p>";
    pub const CATEGORY: &str = "General";
    pub const AUTHOR: &str = "Mikuba TV Newsroom";
    pub const DATE: &str = "Unknown date";
    pub const IMAGE_URL: &str = "https://via.placeholder.com/900x500/CCCCCC/666666?text=Image+Missing";
}

/// Default display date format, e.g. `19-10-2026`.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

fn or_placeholder(value: Option<String>, fallback: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => fallback.to_string(),
    }
}

fn trimmed_or_placeholder(value: Option<String>, fallback: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// Turn an admin draft into the document that gets written.
///
/// Missing or blank fields fall back to placeholders, so the stored title is
/// never empty. `image_url` is kept verbatim; it is only checked when rendered.
pub fn normalize_draft(draft: ArticleDraft, date: String) -> NewArticle {
    NewArticle {
        title: trimmed_or_placeholder(draft.title, placeholder::TITLE),
        summary: or_placeholder(draft.summary, placeholder::SUMMARY),
        body: or_placeholder(draft.body, placeholder::BODY),
        category: or_placeholder(draft.category, placeholder::CATEGORY),
        author: or_placeholder(draft.author, placeholder::AUTHOR),
        image_url: draft.image_url.filter(|url| !url.trim().is_empty()),
        date,
        timestamp: ServerValue::timestamp(),
    }
}

/// Human-readable publication date, computed once on the client at submission time.
pub fn display_date<Tz>(now: &DateTime<Tz>, format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    now.format(format).to_string()
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn timestamp_field(map: &Map<String, Value>) -> i64 {
    match map.get(TIMESTAMP_FIELD) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        _ => 0,
    }
}

impl ArticleRecord {
    /// Read a stored document, applying the same defaults as `normalize_draft`.
    ///
    /// Returns `None` when the document is not a JSON object. Fields of the
    /// wrong type count as missing.
    pub fn from_document(id: &str, value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if !matches!(map.get(TIMESTAMP_FIELD), Some(Value::Number(_))) {
            debug!("Article {} has no numeric timestamp, sorting it as oldest", id);
        }

        Some(Self {
            id: id.to_string(),
            title: trimmed_or_placeholder(string_field(map, "title"), placeholder::TITLE),
            summary: or_placeholder(string_field(map, "summary"), placeholder::SUMMARY),
            body: or_placeholder(string_field(map, "body"), placeholder::BODY),
            category: or_placeholder(string_field(map, "category"), placeholder::CATEGORY),
            author: or_placeholder(string_field(map, "author"), placeholder::AUTHOR),
            image_url: string_field(map, "imageUrl"),
            date: or_placeholder(string_field(map, "date"), placeholder::DATE),
            timestamp: timestamp_field(map),
        })
    }
}
