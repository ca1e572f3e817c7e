use super::schema::Database;
use super::types::{now_ms, Entity, HighlightDbRow, StoreError};
use crate::model::{Highlight, HighlightColor, NewHighlight};

const HIGHLIGHT_COLUMNS: &str =
    "id, article_id, user_id, selected_text, selector_info, color, created_at";

impl Database {
    // ========================================================================
    // Highlight Operations
    // ========================================================================

    /// Create a highlight on an article the user owns.
    ///
    /// The selector is stored as opaque JSON; resolution happens against a
    /// document tree at render time, never here.
    pub async fn create_highlight(
        &self,
        user_id: &str,
        article_id: i64,
        new: &NewHighlight,
    ) -> Result<Highlight, StoreError> {
        if new.selected_text.trim().is_empty() {
            return Err(StoreError::Validation(
                "selectedText must not be empty".to_string(),
            ));
        }
        self.assert_article_owner(user_id, article_id).await?;

        let selector = serde_json::to_string(&new.selector_info)
            .map_err(|e| StoreError::Decode(format!("selector info: {e}")))?;

        let sql = format!(
            "INSERT INTO highlights (article_id, user_id, selected_text, selector_info, color, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {HIGHLIGHT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, HighlightDbRow>(&sql)
            .bind(article_id)
            .bind(user_id)
            .bind(&new.selected_text)
            .bind(selector)
            .bind(new.color.as_str())
            .bind(now_ms())
            .fetch_one(&self.pool)
            .await?;

        row.into_highlight()
    }

    /// Highlights for an article in creation order.
    pub async fn highlights_for_article(
        &self,
        user_id: &str,
        article_id: i64,
    ) -> Result<Vec<Highlight>, StoreError> {
        self.assert_article_owner(user_id, article_id).await?;

        let sql = format!(
            "SELECT {HIGHLIGHT_COLUMNS} FROM highlights WHERE article_id = ? \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, HighlightDbRow>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(HighlightDbRow::into_highlight).collect()
    }

    /// Change a highlight's color.
    pub async fn recolor_highlight(
        &self,
        user_id: &str,
        highlight_id: i64,
        color: HighlightColor,
    ) -> Result<Highlight, StoreError> {
        let sql = format!(
            "UPDATE highlights SET color = ? WHERE id = ? AND user_id = ? \
             RETURNING {HIGHLIGHT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, HighlightDbRow>(&sql)
            .bind(color.as_str())
            .bind(highlight_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(Entity::Highlight))?;

        row.into_highlight()
    }

    /// Delete a highlight. Notes that referenced it stay behind with the
    /// reference cleared.
    pub async fn delete_highlight(
        &self,
        user_id: &str,
        highlight_id: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM highlights WHERE id = ? AND user_id = ?")
            .bind(highlight_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Highlight));
        }
        Ok(())
    }

    /// Confirms the article exists and belongs to the user.
    pub(crate) async fn assert_article_owner(
        &self,
        user_id: &str,
        article_id: i64,
    ) -> Result<(), StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM articles WHERE id = ? AND user_id = ?")
                .bind(article_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|_| ()).ok_or(StoreError::NotFound(Entity::Article))
    }
}
