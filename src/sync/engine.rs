//! Applies a merge plan against the authoritative store.

use futures::{stream, StreamExt};

use super::reconciler::{reconcile, MergePlan};
use crate::model::LocalArticle;
use crate::storage::{Database, StoreError};

/// Max concurrent store writes per sync batch
const SYNC_CONCURRENCY: usize = 8;

/// Result of one sync run.
///
/// `articles` is the merged list the client adopts. It reflects the intended
/// merge even when some writes fail; callers that need certainty about the
/// stored state re-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub articles: Vec<LocalArticle>,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

enum WriteOp {
    Create(LocalArticle),
    Update(i64, LocalArticle),
}

#[derive(Clone, Copy)]
enum Applied {
    Created,
    Updated,
}

struct WriteResult {
    url: String,
    result: Result<Applied, StoreError>,
}

/// Run one sync round for a user: plan the merge against the current store
/// contents, apply the writes, and report what changed.
///
/// The planned writes target disjoint identity keys, so they run
/// concurrently. A single failure (say, a duplicate URL racing its twin)
/// never cancels the sibling operations; it is logged and counted in
/// `failed`.
pub async fn sync_articles(
    db: &Database,
    user_id: &str,
    local: &[LocalArticle],
) -> Result<SyncOutcome, StoreError> {
    let remote = db.articles_for_user(user_id).await?;
    let plan = reconcile(local, &remote);

    tracing::debug!(
        local = local.len(),
        remote = remote.len(),
        creates = plan.creates.len(),
        updates = plan.updates.len(),
        "sync plan ready"
    );

    let MergePlan {
        synced,
        creates,
        updates,
    } = plan;

    let ops: Vec<WriteOp> = creates
        .into_iter()
        .map(WriteOp::Create)
        .chain(
            updates
                .into_iter()
                .map(|(id, article)| WriteOp::Update(id, article)),
        )
        .collect();

    let results: Vec<WriteResult> = stream::iter(ops)
        .map(|op| async move {
            match op {
                WriteOp::Create(article) => {
                    let result = db
                        .create_article(user_id, &article)
                        .await
                        .map(|_| Applied::Created);
                    WriteResult {
                        url: article.url,
                        result,
                    }
                }
                WriteOp::Update(id, article) => {
                    let result = db
                        .apply_sync_update(user_id, id, &article)
                        .await
                        .map(|_| Applied::Updated);
                    WriteResult {
                        url: article.url,
                        result,
                    }
                }
            }
        })
        .buffer_unordered(SYNC_CONCURRENCY)
        .collect()
        .await;

    let mut created = 0;
    let mut updated = 0;
    let mut failed = 0;
    for write in &results {
        match &write.result {
            Ok(Applied::Created) => created += 1,
            Ok(Applied::Updated) => updated += 1,
            Err(error) => {
                failed += 1;
                tracing::warn!(url = %write.url, error = %error, "sync write failed");
            }
        }
    }

    Ok(SyncOutcome {
        articles: synced,
        created,
        updated,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::model::ReadStatus;
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn local(url: &str, title: &str, updated_at: Option<DateTime<Utc>>) -> LocalArticle {
        LocalArticle {
            id: None,
            url: url.to_string(),
            title: title.to_string(),
            domain: "example.com".to_string(),
            content_snippet: None,
            word_count: None,
            estimated_reading_time_minutes: None,
            saved_at: ts(1_700_000_000),
            last_accessed_at: None,
            scroll_position: None,
            progress_percent: 0,
            tags: Vec::new(),
            status: ReadStatus::Unread,
            updated_at,
        }
    }

    async fn backdate(db: &Database, article_id: i64, at: DateTime<Utc>) {
        sqlx::query("UPDATE articles SET updated_at = ? WHERE id = ?")
            .bind(at.timestamp_millis())
            .bind(article_id)
            .execute(&db.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sync_applies_creates_and_updates() {
        let db = test_db().await;
        let stored = db
            .create_article("user-1", &local("https://example.com/a", "Server copy", None))
            .await
            .unwrap();
        backdate(&db, stored.id, ts(1_000)).await;

        let mut edited = local("https://example.com/a", "Client edit", Some(ts(2_000)));
        edited.progress_percent = 80;
        let fresh = local("https://example.com/b", "Fresh capture", None);

        let outcome = sync_articles(&db, "user-1", &[edited, fresh]).await.unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.articles.len(), 2);

        let merged = db.get_article("user-1", stored.id).await.unwrap();
        assert_eq!(merged.title, "Client edit");
        assert_eq!(merged.progress_percent, 80);

        let all = db.articles_for_user("user-1").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_second_run_writes_nothing() {
        let db = test_db().await;
        let stored = db
            .create_article("user-1", &local("https://example.com/a", "Server copy", None))
            .await
            .unwrap();
        backdate(&db, stored.id, ts(1_000)).await;

        let client = vec![
            local("https://example.com/a", "Client edit", Some(ts(2_000))),
            local("https://example.com/b", "Fresh capture", None),
        ];

        let first = sync_articles(&db, "user-1", &client).await.unwrap();
        assert_eq!(first.created, 1);
        assert_eq!(first.updated, 1);
        assert_eq!(first.failed, 0);

        // The store reassigned updatedAt on every write, so the same client
        // list is now uniformly older and schedules nothing.
        let second = sync_articles(&db, "user-1", &client).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.failed, 0);
        assert_eq!(second.articles.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_duplicate_url_fails_partially() {
        let db = test_db().await;
        let client = vec![
            local("https://example.com/dup", "First copy", None),
            local("https://example.com/dup", "Second copy", None),
        ];

        let outcome = sync_articles(&db, "user-1", &client).await.unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.articles.len(), 2, "merged list keeps its shape");

        let all = db.articles_for_user("user-1").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_leaves_untouched_store_entries_alone() {
        let db = test_db().await;
        let stored = db
            .create_article(
                "user-1",
                &local("https://example.com/only-remote", "Elsewhere", None),
            )
            .await
            .unwrap();

        let outcome = sync_articles(&db, "user-1", &[]).await.unwrap();

        assert_eq!(outcome.created + outcome.updated + outcome.failed, 0);
        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.articles[0].id, Some(stored.id));

        let after = db.articles_for_user("user-1").await.unwrap();
        assert_eq!(after[0].updated_at, stored.updated_at, "no write happened");
    }

    #[tokio::test]
    async fn test_sync_scopes_to_user() {
        let db = test_db().await;
        db.create_article(
            "user-2",
            &local("https://example.com/x", "Someone else's", None),
        )
        .await
        .unwrap();

        let outcome = sync_articles(&db, "user-1", &[]).await.unwrap();
        assert!(outcome.articles.is_empty());
    }
}
