use std::collections::HashSet;

use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{now_ms, ArticleDbRow, ArticlePage, ArticleQuery, Entity, StoreError};
use crate::model::{Article, ArticlePatch, LocalArticle, ReadStatus, ScrollPosition};
use crate::progress::advance_status;
use crate::util::{validate_article_url, MAX_SEARCH_QUERY_LENGTH};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Page size when the caller does not ask for one
const DEFAULT_PAGE_SIZE: u32 = 50;

/// Hard cap on page size (OOM protection)
const MAX_PAGE_SIZE: u32 = 200;

/// Hard cap on the unpaginated listing used by sync
const MAX_SYNC_ARTICLES: i64 = 10_000;

/// Column list shared by every article query; matches `ArticleDbRow` exactly.
const ARTICLE_COLUMNS: &str = "id, user_id, url, title, domain, content_snippet, word_count, \
     estimated_reading_time_minutes, saved_at, last_accessed_at, scroll_position, \
     progress_percent, tags, status, updated_at";

// ============================================================================
// Validation Helpers
// ============================================================================

fn validate_capture(url: &str, title: &str, progress: u8) -> Result<(), StoreError> {
    validate_article_url(url).map_err(|e| StoreError::Validation(e.to_string()))?;
    if title.trim().is_empty() {
        return Err(StoreError::Validation("title must not be empty".to_string()));
    }
    if progress > 100 {
        return Err(StoreError::Validation(format!(
            "progressPercent must be between 0 and 100, got {progress}"
        )));
    }
    Ok(())
}

/// Trim tags, drop empties, and deduplicate while preserving first-seen order.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_string()))
        .map(str::to_string)
        .collect()
}

fn encode_tags(tags: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(tags).map_err(|e| StoreError::Decode(format!("tags: {e}")))
}

fn encode_scroll(scroll: &ScrollPosition) -> Result<String, StoreError> {
    serde_json::to_string(scroll).map_err(|e| StoreError::Decode(format!("scroll position: {e}")))
}

/// Domain shown in listings. Falls back to the URL host when the capture
/// did not fill it in.
fn effective_domain(article: &LocalArticle) -> String {
    let domain = article.domain.trim();
    if !domain.is_empty() {
        return domain.to_string();
    }
    url::Url::parse(&article.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Escape LIKE wildcards so search terms match literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Append `WHERE user_id = ? [AND ...]` for a listing query. Used by both
/// the COUNT and the page query so the two always agree.
fn push_article_filters(
    builder: &mut QueryBuilder<'_, sqlx::Sqlite>,
    user_id: &str,
    query: &ArticleQuery,
) {
    builder.push(" WHERE user_id = ");
    builder.push_bind(user_id.to_string());

    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }

    if let Some(tag) = &query.tag {
        // Tags are stored as a JSON array; json_each unpacks it for an
        // exact-match membership test.
        builder.push(" AND EXISTS (SELECT 1 FROM json_each(articles.tags) WHERE json_each.value = ");
        builder.push_bind(tag.clone());
        builder.push(")");
    }

    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = like_pattern(search);
        builder.push(" AND (title LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR content_snippet LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR EXISTS (SELECT 1 FROM json_each(articles.tags) WHERE json_each.value LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\'))");
    }
}

impl Database {
    // ========================================================================
    // Article Creation
    // ========================================================================

    /// Insert a new article for a user.
    ///
    /// The caller's `id` and `updated_at` are ignored; the store assigns
    /// both. A second article with the same URL for the same user fails
    /// with [`StoreError::DuplicateArticle`].
    pub async fn create_article(
        &self,
        user_id: &str,
        article: &LocalArticle,
    ) -> Result<Article, StoreError> {
        validate_capture(&article.url, &article.title, article.progress_percent)?;

        let tags = encode_tags(&normalize_tags(&article.tags))?;
        let scroll = article
            .scroll_position
            .as_ref()
            .map(encode_scroll)
            .transpose()?;

        let sql = format!(
            "INSERT INTO articles (user_id, url, title, domain, content_snippet, word_count, \
             estimated_reading_time_minutes, saved_at, last_accessed_at, scroll_position, \
             progress_percent, tags, status, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(user_id)
            .bind(&article.url)
            .bind(article.title.trim())
            .bind(effective_domain(article))
            .bind(&article.content_snippet)
            .bind(article.word_count.map(i64::from))
            .bind(article.estimated_reading_time_minutes.map(i64::from))
            .bind(article.saved_at.timestamp_millis())
            .bind(article.last_accessed_at.map(|t| t.timestamp_millis()))
            .bind(scroll)
            .bind(i64::from(article.progress_percent))
            .bind(tags)
            .bind(article.status.as_str())
            .bind(now_ms())
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_insert)?;

        row.into_article()
    }

    /// Save a capture, inserting or refreshing by `(user_id, url)`.
    ///
    /// Uses a two-phase upsert: INSERT OR IGNORE lands only when the URL is
    /// new for the user, and the follow-up UPDATE refreshes capture metadata
    /// (title, domain, snippet, counts) for an existing save while leaving
    /// reading state (progress, status, scroll, tags) untouched.
    ///
    /// Returns the stored article and whether it was newly created.
    pub async fn save_article(
        &self,
        user_id: &str,
        article: &LocalArticle,
    ) -> Result<(Article, bool), StoreError> {
        validate_capture(&article.url, &article.title, article.progress_percent)?;

        let tags = encode_tags(&normalize_tags(&article.tags))?;
        let scroll = article
            .scroll_position
            .as_ref()
            .map(encode_scroll)
            .transpose()?;
        let domain = effective_domain(article);
        let now = now_ms();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO articles (user_id, url, title, domain, content_snippet, \
             word_count, estimated_reading_time_minutes, saved_at, last_accessed_at, \
             scroll_position, progress_percent, tags, status, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&article.url)
        .bind(article.title.trim())
        .bind(&domain)
        .bind(&article.content_snippet)
        .bind(article.word_count.map(i64::from))
        .bind(article.estimated_reading_time_minutes.map(i64::from))
        .bind(article.saved_at.timestamp_millis())
        .bind(article.last_accessed_at.map(|t| t.timestamp_millis()))
        .bind(scroll)
        .bind(i64::from(article.progress_percent))
        .bind(tags)
        .bind(article.status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if !inserted {
            sqlx::query(
                "UPDATE articles SET title = ?, domain = ?, content_snippet = ?, \
                 word_count = ?, estimated_reading_time_minutes = ?, updated_at = ? \
                 WHERE user_id = ? AND url = ?",
            )
            .bind(article.title.trim())
            .bind(&domain)
            .bind(&article.content_snippet)
            .bind(article.word_count.map(i64::from))
            .bind(article.estimated_reading_time_minutes.map(i64::from))
            .bind(now)
            .bind(user_id)
            .bind(&article.url)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE user_id = ? AND url = ?");
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(user_id)
            .bind(&article.url)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((row.into_article()?, inserted))
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Fetch one article, recording the access time.
    ///
    /// Only `last_accessed_at` is touched. `updated_at` is reserved for
    /// actual modifications, so reading an article never wins a sync
    /// comparison.
    pub async fn get_article(&self, user_id: &str, article_id: i64) -> Result<Article, StoreError> {
        let sql = format!(
            "UPDATE articles SET last_accessed_at = ? WHERE id = ? AND user_id = ? \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(now_ms())
            .bind(article_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(Entity::Article))?;

        row.into_article()
    }

    /// List a user's articles with filtering, sorting, and pagination.
    ///
    /// Filters: `status` (exact), `tag` (exact membership), `search`
    /// (case-insensitive substring over title, snippet, and tags, with LIKE
    /// wildcards escaped). Sort columns go through the [`super::SortField`]
    /// whitelist. `limit` defaults to 50 and is capped; `page` is 1-based.
    pub async fn list_articles(
        &self,
        user_id: &str,
        query: &ArticleQuery,
    ) -> Result<ArticlePage, StoreError> {
        if let Some(search) = &query.search {
            if search.len() > MAX_SEARCH_QUERY_LENGTH {
                return Err(StoreError::Validation(format!(
                    "search query exceeds maximum length of {MAX_SEARCH_QUERY_LENGTH} characters"
                )));
            }
        }

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = query.page.unwrap_or(1).max(1);
        let offset = i64::from(page - 1) * i64::from(limit);

        tracing::debug!(
            limit = limit,
            page = page,
            sort = query.sort.field.column(),
            "list_articles with limit cap"
        );

        let mut count_builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles");
        push_article_filters(&mut count_builder, user_id, query);
        let total: (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;
        let total = total.0 as u64;

        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles"));
        push_article_filters(&mut builder, user_id, query);
        // id tiebreak keeps pagination stable when timestamps collide
        builder.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort.field.column(),
            query.sort.order.keyword(),
            query.sort.order.keyword()
        ));
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(limit));
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows: Vec<ArticleDbRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let articles = rows
            .into_iter()
            .map(ArticleDbRow::into_article)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArticlePage {
            articles,
            total,
            page,
            limit,
            pages: total.div_ceil(u64::from(limit)) as u32,
        })
    }

    /// Every article for a user, newest first. Feeds the sync merge, which
    /// needs the full set rather than a page.
    pub async fn articles_for_user(&self, user_id: &str) -> Result<Vec<Article>, StoreError> {
        tracing::debug!(limit = MAX_SYNC_ARTICLES, "articles_for_user with limit cap");
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE user_id = ? \
             ORDER BY saved_at DESC, id DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(user_id)
            .bind(MAX_SYNC_ARTICLES)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ArticleDbRow::into_article).collect()
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Apply a partial update.
    ///
    /// An explicit `status` in the patch always wins and is the only way in
    /// or out of `archived`. A progress change without an explicit status
    /// runs the automatic transitions instead.
    pub async fn update_article(
        &self,
        user_id: &str,
        article_id: i64,
        patch: &ArticlePatch,
    ) -> Result<Article, StoreError> {
        if *patch == ArticlePatch::default() {
            return Err(StoreError::Validation("no fields to update".to_string()));
        }
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(StoreError::Validation("title must not be empty".to_string()));
            }
        }
        if let Some(progress) = patch.progress_percent {
            if progress > 100 {
                return Err(StoreError::Validation(format!(
                    "progressPercent must be between 0 and 100, got {progress}"
                )));
            }
        }

        let status = match (patch.status, patch.progress_percent) {
            (Some(explicit), _) => Some(explicit),
            (None, Some(progress)) => {
                let current = self.article_status(user_id, article_id).await?;
                Some(advance_status(current, progress))
            }
            (None, None) => None,
        };

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE articles SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(title) = &patch.title {
                set.push("title = ");
                set.push_bind_unseparated(title.trim().to_string());
            }
            if let Some(snippet) = &patch.content_snippet {
                set.push("content_snippet = ");
                set.push_bind_unseparated(snippet.clone());
            }
            if let Some(tags) = &patch.tags {
                set.push("tags = ");
                set.push_bind_unseparated(encode_tags(&normalize_tags(tags))?);
            }
            if let Some(progress) = patch.progress_percent {
                set.push("progress_percent = ");
                set.push_bind_unseparated(i64::from(progress));
            }
            if let Some(scroll) = &patch.scroll_position {
                set.push("scroll_position = ");
                set.push_bind_unseparated(encode_scroll(scroll)?);
            }
            if let Some(status) = status {
                set.push("status = ");
                set.push_bind_unseparated(status.as_str());
            }
            set.push("updated_at = ");
            set.push_bind_unseparated(now_ms());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(article_id);
        builder.push(" AND user_id = ");
        builder.push_bind(user_id.to_string());
        builder.push(format!(" RETURNING {ARTICLE_COLUMNS}"));

        let row: Option<ArticleDbRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound(Entity::Article))?.into_article()
    }

    /// Record reading progress, running the automatic status transitions and
    /// touching the access time. The scroll position is only replaced when
    /// the reader sent one.
    pub async fn update_progress(
        &self,
        user_id: &str,
        article_id: i64,
        scroll: Option<&ScrollPosition>,
        progress: u8,
    ) -> Result<Article, StoreError> {
        if progress > 100 {
            return Err(StoreError::Validation(format!(
                "progressPercent must be between 0 and 100, got {progress}"
            )));
        }

        let current = self.article_status(user_id, article_id).await?;
        let next = advance_status(current, progress);
        let now = now_ms();

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE articles SET ");
        {
            let mut set = builder.separated(", ");
            set.push("progress_percent = ");
            set.push_bind_unseparated(i64::from(progress));
            set.push("status = ");
            set.push_bind_unseparated(next.as_str());
            if let Some(scroll) = scroll {
                set.push("scroll_position = ");
                set.push_bind_unseparated(encode_scroll(scroll)?);
            }
            set.push("last_accessed_at = ");
            set.push_bind_unseparated(now);
            set.push("updated_at = ");
            set.push_bind_unseparated(now);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(article_id);
        builder.push(" AND user_id = ");
        builder.push_bind(user_id.to_string());
        builder.push(format!(" RETURNING {ARTICLE_COLUMNS}"));

        let row: Option<ArticleDbRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound(Entity::Article))?.into_article()
    }

    /// Replace the tag set.
    pub async fn update_tags(
        &self,
        user_id: &str,
        article_id: i64,
        tags: &[String],
    ) -> Result<Article, StoreError> {
        let encoded = encode_tags(&normalize_tags(tags))?;
        let sql = format!(
            "UPDATE articles SET tags = ?, updated_at = ? WHERE id = ? AND user_id = ? \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(encoded)
            .bind(now_ms())
            .bind(article_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(Entity::Article))?;

        row.into_article()
    }

    /// Delete an article. Highlights and notes go with it through the
    /// cascade rules.
    pub async fn delete_article(&self, user_id: &str, article_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ? AND user_id = ?")
            .bind(article_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Article));
        }
        Ok(())
    }

    /// Overwrite a stored article with a newer client copy during sync.
    ///
    /// The URL is identity and never rewritten; `saved_at` keeps the
    /// client's capture time while `updated_at` is reassigned by the store.
    pub async fn apply_sync_update(
        &self,
        user_id: &str,
        article_id: i64,
        incoming: &LocalArticle,
    ) -> Result<Article, StoreError> {
        if incoming.title.trim().is_empty() {
            return Err(StoreError::Validation("title must not be empty".to_string()));
        }
        if incoming.progress_percent > 100 {
            return Err(StoreError::Validation(format!(
                "progressPercent must be between 0 and 100, got {}",
                incoming.progress_percent
            )));
        }

        let tags = encode_tags(&normalize_tags(&incoming.tags))?;
        let scroll = incoming
            .scroll_position
            .as_ref()
            .map(encode_scroll)
            .transpose()?;

        let sql = format!(
            "UPDATE articles SET title = ?, domain = ?, content_snippet = ?, word_count = ?, \
             estimated_reading_time_minutes = ?, saved_at = ?, last_accessed_at = ?, \
             scroll_position = ?, progress_percent = ?, tags = ?, status = ?, updated_at = ? \
             WHERE id = ? AND user_id = ? RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(incoming.title.trim())
            .bind(effective_domain(incoming))
            .bind(&incoming.content_snippet)
            .bind(incoming.word_count.map(i64::from))
            .bind(incoming.estimated_reading_time_minutes.map(i64::from))
            .bind(incoming.saved_at.timestamp_millis())
            .bind(incoming.last_accessed_at.map(|t| t.timestamp_millis()))
            .bind(scroll)
            .bind(i64::from(incoming.progress_percent))
            .bind(tags)
            .bind(incoming.status.as_str())
            .bind(now_ms())
            .bind(article_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(Entity::Article))?;

        row.into_article()
    }

    async fn article_status(
        &self,
        user_id: &str,
        article_id: i64,
    ) -> Result<ReadStatus, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM articles WHERE id = ? AND user_id = ?")
                .bind(article_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let (status,) = row.ok_or(StoreError::NotFound(Entity::Article))?;
        ReadStatus::parse(&status)
            .ok_or_else(|| StoreError::Decode(format!("unknown status: {status}")))
    }
}
