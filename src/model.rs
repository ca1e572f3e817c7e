//! Shared domain types for articles, highlights, and notes.
//!
//! Wire forms follow the REST contracts (camelCase field names, tagged
//! unions for the dynamic fields). The same structs back the local cache
//! file, the HTTP client, and the authoritative store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::SelectorInfo;

/// Reading lifecycle of an article.
///
/// `unread → in-progress → finished` advance automatically from progress
/// updates (see [`crate::progress::advance_status`]); `archived` is only
/// ever entered or left by an explicit update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadStatus {
    #[default]
    Unread,
    InProgress,
    Finished,
    Archived,
}

impl ReadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadStatus::Unread => "unread",
            ReadStatus::InProgress => "in-progress",
            ReadStatus::Finished => "finished",
            ReadStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unread" => Some(ReadStatus::Unread),
            "in-progress" => Some(ReadStatus::InProgress),
            "finished" => Some(ReadStatus::Finished),
            "archived" => Some(ReadStatus::Archived),
            _ => None,
        }
    }
}

/// Where the reader left off, as reported by the reading surface.
///
/// Wire shape is `{"type": ..., "value": ...}`. The `selector` kind anchors
/// the position structurally, the same way highlight descriptors do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ScrollPosition {
    /// Absolute scroll offset in CSS pixels.
    Pixel(f64),
    /// Scroll offset as a percentage of the scrollable height.
    Percent(f64),
    /// Structural anchor to the topmost visible node.
    Selector(NodeAnchor),
}

/// Structural position used by [`ScrollPosition::Selector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAnchor {
    pub path: Vec<usize>,
    pub offset: usize,
}

/// Fixed highlight palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
}

impl HighlightColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "yellow" => Some(HighlightColor::Yellow),
            "green" => Some(HighlightColor::Green),
            "blue" => Some(HighlightColor::Blue),
            "pink" => Some(HighlightColor::Pink),
            _ => None,
        }
    }
}

/// Authoritative article record. Identity is the `(userId, url)` pair;
/// `updatedAt` is server-assigned on every write and is the timestamp that
/// conflict resolution trusts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_reading_time_minutes: Option<u32>,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_position: Option<ScrollPosition>,
    pub progress_percent: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: ReadStatus,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Client-side view of this record, for cache writes and sync results.
    pub fn into_local(self) -> LocalArticle {
        LocalArticle {
            id: Some(self.id),
            url: self.url,
            title: self.title,
            domain: self.domain,
            content_snippet: self.content_snippet,
            word_count: self.word_count,
            estimated_reading_time_minutes: self.estimated_reading_time_minutes,
            saved_at: self.saved_at,
            last_accessed_at: self.last_accessed_at,
            scroll_position: self.scroll_position,
            progress_percent: self.progress_percent,
            tags: self.tags,
            status: self.status,
            updated_at: Some(self.updated_at),
        }
    }
}

/// Client-side article shape.
///
/// May predate any server contact: `id` is absent until the authoritative
/// store assigns one, and `updatedAt` is absent for purely local edits
/// (absent timestamps never win a sync comparison).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalArticle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub url: String,
    pub title: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_reading_time_minutes: Option<u32>,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_position: Option<ScrollPosition>,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ReadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update for an article; `None` fields are left untouched.
///
/// `status` is the only way in or out of `archived` — progress updates
/// deliberately cannot move an archived article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content_snippet: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ReadStatus>,
    pub progress_percent: Option<u8>,
    pub scroll_position: Option<ScrollPosition>,
}

/// Persisted highlight. `selectedText` is the capture-time text and is never
/// rewritten when the anchor re-resolves elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: i64,
    pub article_id: i64,
    pub user_id: String,
    pub selected_text: String,
    pub selector_info: SelectorInfo,
    pub color: HighlightColor,
    pub created_at: DateTime<Utc>,
}

/// Fields the caller supplies when creating a highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHighlight {
    pub selected_text: String,
    pub selector_info: SelectorInfo,
    #[serde(default)]
    pub color: HighlightColor,
}

/// Free-text annotation on an article, optionally tied to one highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub article_id: i64,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<i64>,
    pub note_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields the caller supplies when creating a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<i64>,
    pub note_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ReadStatus::Unread,
            ReadStatus::InProgress,
            ReadStatus::Finished,
            ReadStatus::Archived,
        ] {
            assert_eq!(ReadStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReadStatus::parse("reading"), None);
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&ReadStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let parsed: ReadStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(parsed, ReadStatus::Archived);
    }

    #[test]
    fn test_scroll_position_tagged_shape() {
        let pixel = serde_json::to_value(ScrollPosition::Pixel(420.0)).unwrap();
        assert_eq!(pixel, serde_json::json!({"type": "pixel", "value": 420.0}));

        let selector = serde_json::to_value(ScrollPosition::Selector(NodeAnchor {
            path: vec![2, 0],
            offset: 14,
        }))
        .unwrap();
        assert_eq!(
            selector,
            serde_json::json!({"type": "selector", "value": {"path": [2, 0], "offset": 14}})
        );

        let parsed: ScrollPosition =
            serde_json::from_value(serde_json::json!({"type": "percent", "value": 37.5})).unwrap();
        assert_eq!(parsed, ScrollPosition::Percent(37.5));
    }

    #[test]
    fn test_local_article_tolerates_sparse_json() {
        // A freshly captured article has no id, no updatedAt, default status.
        let parsed: LocalArticle = serde_json::from_value(serde_json::json!({
            "url": "https://example.com/post",
            "title": "Post",
            "domain": "example.com",
            "savedAt": "2025-11-04T10:00:00Z",
        }))
        .unwrap();

        assert_eq!(parsed.id, None);
        assert_eq!(parsed.updated_at, None);
        assert_eq!(parsed.status, ReadStatus::Unread);
        assert_eq!(parsed.progress_percent, 0);
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_article_into_local_keeps_identity() {
        let article = Article {
            id: 7,
            user_id: "user-1".to_string(),
            url: "https://example.com/a".to_string(),
            title: "A".to_string(),
            domain: "example.com".to_string(),
            content_snippet: None,
            word_count: Some(900),
            estimated_reading_time_minutes: Some(5),
            saved_at: Utc::now(),
            last_accessed_at: None,
            scroll_position: None,
            progress_percent: 25,
            tags: vec!["rust".to_string()],
            status: ReadStatus::InProgress,
            updated_at: Utc::now(),
        };

        let local = article.clone().into_local();
        assert_eq!(local.id, Some(7));
        assert_eq!(local.updated_at, Some(article.updated_at));
        assert_eq!(local.url, article.url);
        assert_eq!(local.tags, article.tags);
    }
}
