use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Article, Highlight, HighlightColor, Note, ReadStatus};

// ============================================================================
// Error Types
// ============================================================================

/// Entity kind referenced by [`StoreError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Article,
    Highlight,
    Note,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Article => "article",
            Entity::Highlight => "highlight",
            Entity::Note => "note",
        };
        f.write_str(name)
    }
}

/// Errors from the authoritative store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process has the database locked.
    #[error("Another instance of dogear appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Referenced entity does not exist or belongs to a different user.
    /// The two cases are deliberately indistinguishable to the caller.
    #[error("{0} not found")]
    NotFound(Entity),

    /// Malformed input; nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A create would break the `(user_id, url)` uniqueness invariant.
    #[error("an article with this URL already exists for this user")]
    DuplicateArticle,

    /// A stored row no longer decodes into its domain type.
    #[error("corrupt row: {0}")]
    Decode(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }

    /// Maps an insert failure, turning a `(user_id, url)` uniqueness
    /// violation into [`StoreError::DuplicateArticle`].
    pub(crate) fn from_insert(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.message().contains("UNIQUE constraint failed") {
                return StoreError::DuplicateArticle;
            }
        }
        StoreError::Other(err)
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Sortable article columns. The SQL column name never comes from user
/// input; it is looked up through this whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    SavedAt,
    UpdatedAt,
    LastAccessedAt,
    Title,
    ProgressPercent,
}

impl SortField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            SortField::SavedAt => "saved_at",
            SortField::UpdatedAt => "updated_at",
            SortField::LastAccessedAt => "last_accessed_at",
            SortField::Title => "title",
            SortField::ProgressPercent => "progress_percent",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "savedAt" => Some(SortField::SavedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "lastAccessedAt" => Some(SortField::LastAccessedAt),
            "title" => Some(SortField::Title),
            "progressPercent" => Some(SortField::ProgressPercent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Sort choice, parseable from the `field-direction` form the list
/// surface and the CLI both use (`savedAt-desc`, `title-asc`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArticleSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl FromStr for ArticleSort {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (field_part, order_part) = match value.rsplit_once('-') {
            Some(parts) => parts,
            None => (value, "desc"),
        };

        let field = SortField::parse(field_part)
            .ok_or_else(|| format!("unknown sort field: {field_part}"))?;
        let order = match order_part {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => return Err(format!("sort direction must be asc or desc, got: {other}")),
        };

        Ok(ArticleSort { field, order })
    }
}

/// Filters and paging for the article listing surface.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub status: Option<ReadStatus>,
    /// Exact match against any tag in the article's tag set.
    pub tag: Option<String>,
    /// Case-insensitive substring over title, snippet, and tags.
    pub search: Option<String>,
    pub sort: ArticleSort,
    /// Page size; defaults to 50, capped.
    pub limit: Option<u32>,
    /// 1-based page number.
    pub page: Option<u32>,
}

/// One page of an article listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    /// Total page count for the current limit (0 when there are no rows).
    pub pages: u32,
}

// ============================================================================
// Row Types
// ============================================================================

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn datetime_from_ms(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Decode(format!("timestamp out of range: {ms}")))
}

/// Internal row type for article queries (used by sqlx FromRow).
/// Converts to the domain type via `into_article()`, decoding the JSON
/// columns (tags, scroll position) and the status string.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: i64,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub domain: String,
    pub content_snippet: Option<String>,
    pub word_count: Option<i64>,
    pub estimated_reading_time_minutes: Option<i64>,
    pub saved_at: i64,
    pub last_accessed_at: Option<i64>,
    pub scroll_position: Option<String>,
    pub progress_percent: i64,
    pub tags: String,
    pub status: String,
    pub updated_at: i64,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Result<Article, StoreError> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)
            .map_err(|e| StoreError::Decode(format!("tags column: {e}")))?;
        let scroll_position = self
            .scroll_position
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StoreError::Decode(format!("scroll_position column: {e}")))?;
        let status = ReadStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Decode(format!("unknown status: {}", self.status)))?;

        Ok(Article {
            id: self.id,
            user_id: self.user_id,
            url: self.url,
            title: self.title,
            domain: self.domain,
            content_snippet: self.content_snippet,
            word_count: self.word_count.map(|v| v as u32),
            estimated_reading_time_minutes: self
                .estimated_reading_time_minutes
                .map(|v| v as u32),
            saved_at: datetime_from_ms(self.saved_at)?,
            last_accessed_at: self.last_accessed_at.map(datetime_from_ms).transpose()?,
            scroll_position,
            progress_percent: self.progress_percent as u8,
            tags,
            status,
            updated_at: datetime_from_ms(self.updated_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HighlightDbRow {
    pub id: i64,
    pub article_id: i64,
    pub user_id: String,
    pub selected_text: String,
    pub selector_info: String,
    pub color: String,
    pub created_at: i64,
}

impl HighlightDbRow {
    pub(crate) fn into_highlight(self) -> Result<Highlight, StoreError> {
        let selector_info = serde_json::from_str(&self.selector_info)
            .map_err(|e| StoreError::Decode(format!("selector_info column: {e}")))?;
        let color = HighlightColor::parse(&self.color)
            .ok_or_else(|| StoreError::Decode(format!("unknown color: {}", self.color)))?;

        Ok(Highlight {
            id: self.id,
            article_id: self.article_id,
            user_id: self.user_id,
            selected_text: self.selected_text,
            selector_info,
            color,
            created_at: datetime_from_ms(self.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NoteDbRow {
    pub id: i64,
    pub article_id: i64,
    pub user_id: String,
    pub highlight_id: Option<i64>,
    pub note_text: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NoteDbRow {
    pub(crate) fn into_note(self) -> Result<Note, StoreError> {
        Ok(Note {
            id: self.id,
            article_id: self.article_id,
            user_id: self.user_id,
            highlight_id: self.highlight_id,
            note_text: self.note_text,
            created_at: datetime_from_ms(self.created_at)?,
            updated_at: datetime_from_ms(self.updated_at)?,
        })
    }
}
