//! Integration tests for the article lifecycle: capture, save, annotate, read, delete.
//!
//! Each test creates its own in-memory SQLite database for isolation.
//! These tests exercise the public crate surface end-to-end, verifying
//! that capture output is storable as-is and that operations compose
//! correctly across articles, highlights, and notes.

use dogear::anchor::{RangeSelector, SelectorInfo};
use dogear::capture::{capture_article, CapturedPage};
use dogear::model::{
    ArticlePatch, HighlightColor, NewHighlight, NewNote, NodeAnchor, ReadStatus, ScrollPosition,
};
use dogear::storage::{ArticleQuery, Database, Entity, StoreError};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn test_page(slug: &str, title: &str) -> CapturedPage {
    CapturedPage {
        url: format!("https://example.com/{}", slug),
        title: title.to_string(),
        body_text: "word ".repeat(600),
        paragraphs: vec![
            "The opening paragraph of the article.".to_string(),
            "A second paragraph with more detail.".to_string(),
        ],
    }
}

fn test_highlight(text: &str) -> NewHighlight {
    NewHighlight {
        selected_text: text.to_string(),
        selector_info: SelectorInfo::Range(RangeSelector {
            start_path: vec![1, 0],
            start_offset: 4,
            end_path: vec![1, 0],
            end_offset: 4 + text.len(),
        }),
        color: HighlightColor::Yellow,
    }
}

// ============================================================================
// Capture to Store Tests
// ============================================================================

#[tokio::test]
async fn test_captured_page_saves_as_is() {
    let db = test_db().await;

    let local = capture_article(&test_page("ownership", "Understanding Ownership")).unwrap();
    let stored = db.create_article("user-1", &local).await.unwrap();

    assert!(stored.id > 0);
    assert_eq!(stored.url, "https://example.com/ownership");
    assert_eq!(stored.title, "Understanding Ownership");
    assert_eq!(stored.domain, "example.com");
    assert_eq!(stored.word_count, Some(600));
    assert_eq!(stored.estimated_reading_time_minutes, Some(3));
    assert!(stored
        .content_snippet
        .as_deref()
        .unwrap()
        .starts_with("The opening paragraph"));
    assert_eq!(stored.status, ReadStatus::Unread);
    assert_eq!(stored.progress_percent, 0);
}

#[tokio::test]
async fn test_recapture_keeps_reading_state() {
    let db = test_db().await;

    let local = capture_article(&test_page("post", "First Capture")).unwrap();
    let (stored, created) = db.save_article("user-1", &local).await.unwrap();
    assert!(created);

    db.update_progress("user-1", stored.id, None, 45)
        .await
        .unwrap();

    // Saving the same page again refreshes metadata but not reading state
    let again = capture_article(&test_page("post", "Retitled Capture")).unwrap();
    let (resaved, created) = db.save_article("user-1", &again).await.unwrap();

    assert!(!created);
    assert_eq!(resaved.id, stored.id);
    assert_eq!(resaved.title, "Retitled Capture");
    assert_eq!(resaved.progress_percent, 45);
    assert_eq!(resaved.status, ReadStatus::InProgress);
}

// ============================================================================
// Reading Session Tests
// ============================================================================

#[tokio::test]
async fn test_reading_session_advances_and_pins_scroll() {
    let db = test_db().await;
    let local = capture_article(&test_page("long-read", "A Long Read")).unwrap();
    let stored = db.create_article("user-1", &local).await.unwrap();

    let anchor = ScrollPosition::Selector(NodeAnchor {
        path: vec![4, 2],
        offset: 17,
    });
    let midway = db
        .update_progress("user-1", stored.id, Some(&anchor), 35)
        .await
        .unwrap();
    assert_eq!(midway.status, ReadStatus::InProgress);
    assert_eq!(midway.scroll_position, Some(anchor.clone()));

    let finished = db
        .update_progress("user-1", stored.id, None, 100)
        .await
        .unwrap();
    assert_eq!(finished.status, ReadStatus::Finished);
    // The last scroll anchor is kept when the reader sends none
    assert_eq!(finished.scroll_position, Some(anchor));

    let fetched = db.get_article("user-1", stored.id).await.unwrap();
    assert_eq!(fetched.progress_percent, 100);
    assert!(fetched.last_accessed_at.is_some());
}

// ============================================================================
// Annotation Tests
// ============================================================================

#[tokio::test]
async fn test_highlight_and_note_round_trip() {
    let db = test_db().await;
    let local = capture_article(&test_page("post", "Post")).unwrap();
    let stored = db.create_article("user-1", &local).await.unwrap();

    let first = db
        .create_highlight("user-1", stored.id, &test_highlight("opening paragraph"))
        .await
        .unwrap();
    let second = db
        .create_highlight("user-1", stored.id, &test_highlight("more detail"))
        .await
        .unwrap();

    let listed = db
        .highlights_for_article("user-1", stored.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id, "creation order");
    assert_eq!(listed[0].selected_text, "opening paragraph");

    let note = db
        .create_note(
            "user-1",
            stored.id,
            &NewNote {
                highlight_id: Some(second.id),
                note_text: "follow up on this".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(note.highlight_id, Some(second.id));

    let recolored = db
        .recolor_highlight("user-1", second.id, HighlightColor::Pink)
        .await
        .unwrap();
    assert_eq!(recolored.color, HighlightColor::Pink);
    assert_eq!(recolored.selected_text, "more detail");

    let notes = db.notes_for_article("user-1", stored.id).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].highlight_id, Some(second.id));
}

#[tokio::test]
async fn test_deleting_highlight_detaches_note() {
    let db = test_db().await;
    let local = capture_article(&test_page("post", "Post")).unwrap();
    let stored = db.create_article("user-1", &local).await.unwrap();

    let highlight = db
        .create_highlight("user-1", stored.id, &test_highlight("a passage"))
        .await
        .unwrap();
    let note = db
        .create_note(
            "user-1",
            stored.id,
            &NewNote {
                highlight_id: Some(highlight.id),
                note_text: "anchored note".to_string(),
            },
        )
        .await
        .unwrap();

    db.delete_highlight("user-1", highlight.id).await.unwrap();

    let notes = db.notes_for_article("user-1", stored.id).await.unwrap();
    assert_eq!(notes.len(), 1, "note survives its highlight");
    assert_eq!(notes[0].id, note.id);
    assert_eq!(
        notes[0].highlight_id, None,
        "reference is cleared, not cascaded"
    );
}

#[tokio::test]
async fn test_delete_article_removes_annotations() {
    let db = test_db().await;
    let local = capture_article(&test_page("post", "Post")).unwrap();
    let stored = db.create_article("user-1", &local).await.unwrap();

    let highlight = db
        .create_highlight("user-1", stored.id, &test_highlight("a passage"))
        .await
        .unwrap();
    let note = db
        .create_note(
            "user-1",
            stored.id,
            &NewNote {
                highlight_id: None,
                note_text: "standalone".to_string(),
            },
        )
        .await
        .unwrap();

    db.delete_article("user-1", stored.id).await.unwrap();

    let err = db
        .highlights_for_article("user-1", stored.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Article)));

    let err = db.delete_highlight("user-1", highlight.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Highlight)));

    let err = db.delete_note("user-1", note.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Note)));
}

#[tokio::test]
async fn test_annotations_scoped_to_owner() {
    let db = test_db().await;
    let local = capture_article(&test_page("post", "Post")).unwrap();
    let stored = db.create_article("user-1", &local).await.unwrap();
    let highlight = db
        .create_highlight("user-1", stored.id, &test_highlight("a passage"))
        .await
        .unwrap();

    let err = db
        .highlights_for_article("user-2", stored.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Article)));

    let err = db
        .create_highlight("user-2", stored.id, &test_highlight("not yours"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Article)));

    let err = db.delete_highlight("user-2", highlight.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Highlight)));

    // Still there for the owner
    let listed = db
        .highlights_for_article("user-1", stored.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

// ============================================================================
// Full Lifecycle Test
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle_capture_read_annotate_archive_delete() {
    let db = test_db().await;

    // Step 1: Capture and save two pages
    let keeper = capture_article(&test_page("keeper", "The Keeper")).unwrap();
    let keeper = db.create_article("user-1", &keeper).await.unwrap();

    let reading = capture_article(&test_page("reading", "The Current Read")).unwrap();
    let reading = db.create_article("user-1", &reading).await.unwrap();

    // Step 2: Start reading one of them
    let midway = db
        .update_progress(
            "user-1",
            reading.id,
            Some(&ScrollPosition::Pixel(2480.0)),
            35,
        )
        .await
        .unwrap();
    assert_eq!(midway.status, ReadStatus::InProgress);

    // Step 3: Highlight a passage and attach a note
    let highlight = db
        .create_highlight("user-1", reading.id, &test_highlight("opening paragraph"))
        .await
        .unwrap();
    db.create_note(
        "user-1",
        reading.id,
        &NewNote {
            highlight_id: Some(highlight.id),
            note_text: "compare with the keeper".to_string(),
        },
    )
    .await
    .unwrap();

    // Step 4: Finish the article
    let finished = db
        .update_progress("user-1", reading.id, None, 100)
        .await
        .unwrap();
    assert_eq!(finished.status, ReadStatus::Finished);

    // Step 5: Archive it; later progress updates cannot unarchive
    let archive = ArticlePatch {
        status: Some(ReadStatus::Archived),
        ..Default::default()
    };
    db.update_article("user-1", reading.id, &archive)
        .await
        .unwrap();
    let after = db
        .update_progress("user-1", reading.id, None, 10)
        .await
        .unwrap();
    assert_eq!(after.status, ReadStatus::Archived);

    // Step 6: Filter the list by status
    let archived_query = ArticleQuery {
        status: Some(ReadStatus::Archived),
        ..Default::default()
    };
    let page = db.list_articles("user-1", &archived_query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.articles[0].id, reading.id);

    let unread_query = ArticleQuery {
        status: Some(ReadStatus::Unread),
        ..Default::default()
    };
    let page = db.list_articles("user-1", &unread_query).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.articles[0].id, keeper.id);

    // Step 7: Delete the archived article; its annotations go with it
    db.delete_article("user-1", reading.id).await.unwrap();
    let err = db.delete_highlight("user-1", highlight.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Highlight)));

    // Step 8: The other article is untouched
    let page = db
        .list_articles("user-1", &ArticleQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.articles[0].title, "The Keeper");
    assert_eq!(page.articles[0].status, ReadStatus::Unread);
}
