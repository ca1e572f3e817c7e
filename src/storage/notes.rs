use super::schema::Database;
use super::types::{now_ms, Entity, NoteDbRow, StoreError};
use crate::model::{NewNote, Note};

const NOTE_COLUMNS: &str =
    "id, article_id, user_id, highlight_id, note_text, created_at, updated_at";

impl Database {
    // ========================================================================
    // Note Operations
    // ========================================================================

    /// Create a note, optionally attached to one of the article's own
    /// highlights. A highlight from another article is rejected.
    pub async fn create_note(
        &self,
        user_id: &str,
        article_id: i64,
        new: &NewNote,
    ) -> Result<Note, StoreError> {
        if new.note_text.trim().is_empty() {
            return Err(StoreError::Validation(
                "noteText must not be empty".to_string(),
            ));
        }
        self.assert_article_owner(user_id, article_id).await?;

        if let Some(highlight_id) = new.highlight_id {
            let row: Option<(i64,)> = sqlx::query_as(
                "SELECT 1 FROM highlights WHERE id = ? AND article_id = ? AND user_id = ?",
            )
            .bind(highlight_id)
            .bind(article_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            if row.is_none() {
                return Err(StoreError::NotFound(Entity::Highlight));
            }
        }

        let now = now_ms();
        let sql = format!(
            "INSERT INTO notes (article_id, user_id, highlight_id, note_text, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {NOTE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NoteDbRow>(&sql)
            .bind(article_id)
            .bind(user_id)
            .bind(new.highlight_id)
            .bind(&new.note_text)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        row.into_note()
    }

    /// Notes for an article in creation order.
    pub async fn notes_for_article(
        &self,
        user_id: &str,
        article_id: i64,
    ) -> Result<Vec<Note>, StoreError> {
        self.assert_article_owner(user_id, article_id).await?;

        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE article_id = ? \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, NoteDbRow>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(NoteDbRow::into_note).collect()
    }

    /// Replace a note's text. The highlight attachment is immutable; detach
    /// happens only through highlight deletion.
    pub async fn update_note(
        &self,
        user_id: &str,
        note_id: i64,
        note_text: &str,
    ) -> Result<Note, StoreError> {
        if note_text.trim().is_empty() {
            return Err(StoreError::Validation(
                "noteText must not be empty".to_string(),
            ));
        }

        let sql = format!(
            "UPDATE notes SET note_text = ?, updated_at = ? WHERE id = ? AND user_id = ? \
             RETURNING {NOTE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NoteDbRow>(&sql)
            .bind(note_text)
            .bind(now_ms())
            .bind(note_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(Entity::Note))?;

        row.into_note()
    }

    /// Delete a note.
    pub async fn delete_note(&self, user_id: &str, note_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND user_id = ?")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Note));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::anchor::{RangeSelector, SelectorInfo};
    use crate::model::{HighlightColor, LocalArticle, NewHighlight, NewNote, ReadStatus};
    use crate::storage::{Database, Entity, StoreError};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn seeded_article(db: &Database, user_id: &str, slug: &str) -> i64 {
        let article = LocalArticle {
            id: None,
            url: format!("https://example.com/{slug}"),
            title: "Post".to_string(),
            domain: "example.com".to_string(),
            content_snippet: None,
            word_count: None,
            estimated_reading_time_minutes: None,
            saved_at: Utc::now(),
            last_accessed_at: None,
            scroll_position: None,
            progress_percent: 0,
            tags: Vec::new(),
            status: ReadStatus::Unread,
            updated_at: None,
        };
        db.create_article(user_id, &article).await.unwrap().id
    }

    fn note(text: &str, highlight_id: Option<i64>) -> NewNote {
        NewNote {
            highlight_id,
            note_text: text.to_string(),
        }
    }

    fn sample_highlight() -> NewHighlight {
        NewHighlight {
            selected_text: "a passage".to_string(),
            selector_info: SelectorInfo::Range(RangeSelector {
                start_path: vec![0],
                start_offset: 0,
                end_path: vec![0],
                end_offset: 4,
            }),
            color: HighlightColor::default(),
        }
    }

    #[tokio::test]
    async fn test_create_note_returns_record() {
        let db = test_db().await;
        let article_id = seeded_article(&db, "user-1", "a").await;

        let created = db
            .create_note("user-1", article_id, &note("remember this", None))
            .await
            .unwrap();

        assert!(created.id > 0);
        assert_eq!(created.article_id, article_id);
        assert_eq!(created.note_text, "remember this");
        assert_eq!(created.highlight_id, None);
        assert_eq!(created.created_at, created.updated_at);
    }

    #[tokio::test]
    async fn test_create_note_attached_to_highlight() {
        let db = test_db().await;
        let article_id = seeded_article(&db, "user-1", "a").await;
        let other_article = seeded_article(&db, "user-1", "b").await;
        let highlight = db
            .create_highlight("user-1", article_id, &sample_highlight())
            .await
            .unwrap();

        let created = db
            .create_note("user-1", article_id, &note("on the passage", Some(highlight.id)))
            .await
            .unwrap();
        assert_eq!(created.highlight_id, Some(highlight.id));

        // A highlight from a different article cannot be attached
        let err = db
            .create_note("user-1", other_article, &note("wrong", Some(highlight.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Highlight)));
    }

    #[tokio::test]
    async fn test_create_note_validations() {
        let db = test_db().await;
        let article_id = seeded_article(&db, "user-1", "a").await;

        let err = db
            .create_note("user-1", article_id, &note("   ", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = db
            .create_note("user-2", article_id, &note("text", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Article)));
    }

    #[tokio::test]
    async fn test_notes_for_article_in_creation_order() {
        let db = test_db().await;
        let article_id = seeded_article(&db, "user-1", "a").await;

        for text in ["one", "two", "three"] {
            db.create_note("user-1", article_id, &note(text, None))
                .await
                .unwrap();
        }

        let notes = db.notes_for_article("user-1", article_id).await.unwrap();
        let texts: Vec<&str> = notes.iter().map(|n| n.note_text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);

        let err = db.notes_for_article("user-2", article_id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Article)));
    }

    #[tokio::test]
    async fn test_update_note_text() {
        let db = test_db().await;
        let article_id = seeded_article(&db, "user-1", "a").await;
        let created = db
            .create_note("user-1", article_id, &note("draft", None))
            .await
            .unwrap();

        let updated = db
            .update_note("user-1", created.id, "final wording")
            .await
            .unwrap();
        assert_eq!(updated.note_text, "final wording");
        assert!(updated.updated_at >= created.updated_at);

        let err = db
            .update_note("user-2", created.id, "hijack")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Note)));
    }

    #[tokio::test]
    async fn test_delete_note() {
        let db = test_db().await;
        let article_id = seeded_article(&db, "user-1", "a").await;
        let created = db
            .create_note("user-1", article_id, &note("gone soon", None))
            .await
            .unwrap();

        db.delete_note("user-1", created.id).await.unwrap();

        let err = db.delete_note("user-1", created.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(Entity::Note)));
        assert!(db.notes_for_article("user-1", article_id).await.unwrap().is_empty());
    }
}
