//! Merge planning for a client article list against the authoritative store.
//!
//! Pure computation: this module decides who wins and which writes are
//! needed; actually running them is [`super::engine`]'s job.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::model::{Article, LocalArticle};

/// Writes needed to bring the store in line with a client list, plus the
/// merged list the client should adopt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Post-merge article list: one entry per client article in input order,
    /// with store-only articles appended.
    pub synced: Vec<LocalArticle>,
    /// Client-only articles to insert.
    pub creates: Vec<LocalArticle>,
    /// Newer client copies to write over stored rows, keyed by stored id.
    pub updates: Vec<(i64, LocalArticle)>,
}

impl MergePlan {
    pub fn write_count(&self) -> usize {
        self.creates.len() + self.updates.len()
    }
}

/// Merge `local` against `remote`, last-writer-wins on `updatedAt`, keyed
/// by URL.
///
/// A local copy wins only with a strictly newer timestamp; a missing local
/// `updatedAt` counts as the epoch, so untimestamped edits never win, and a
/// tie keeps the stored copy. Stored articles absent from the local list are
/// carried into the merged result with no write scheduled.
///
/// Local duplicates by URL are not collapsed here: each entry is planned on
/// its own, and the store's uniqueness constraint settles the survivors when
/// the writes run.
pub fn reconcile(local: &[LocalArticle], remote: &[Article]) -> MergePlan {
    let by_url: HashMap<&str, &Article> = remote.iter().map(|a| (a.url.as_str(), a)).collect();
    let mut matched: HashSet<&str> = HashSet::new();
    let mut plan = MergePlan::default();

    for local_article in local {
        let Some(remote_article) = by_url.get(local_article.url.as_str()).copied() else {
            // New on this client; the synced entry stays id-less until the
            // store assigns one.
            plan.creates.push(local_article.clone());
            plan.synced.push(local_article.clone());
            continue;
        };
        matched.insert(remote_article.url.as_str());

        let local_ts = local_article
            .updated_at
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        if local_ts > remote_article.updated_at {
            // Client copy is newer; it takes the stored id with it.
            let mut winner = local_article.clone();
            winner.id = Some(remote_article.id);
            plan.updates.push((remote_article.id, winner.clone()));
            plan.synced.push(winner);
        } else {
            plan.synced.push(remote_article.clone().into_local());
        }
    }

    for remote_article in remote {
        if !matched.contains(remote_article.url.as_str()) {
            plan.synced.push(remote_article.clone().into_local());
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReadStatus;

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

    fn remote(id: i64, url: &str, title: &str, updated_at: DateTime<Utc>) -> Article {
        Article {
            id,
            user_id: "user-1".to_string(),
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

    #[test]
    fn test_local_newer_wins_and_keeps_stored_id() {
        let mut edited = local("https://example.com/a", "Edited", Some(ts(2_000)));
        edited.progress_percent = 60;
        let stored = remote(7, "https://example.com/a", "Stale", ts(1_000));

        let plan = reconcile(&[edited.clone()], &[stored]);

        assert_eq!(plan.creates.len(), 0);
        assert_eq!(plan.updates.len(), 1);
        let (id, winner) = &plan.updates[0];
        assert_eq!(*id, 7);
        assert_eq!(winner.title, "Edited");
        assert_eq!(winner.progress_percent, 60);
        assert_eq!(winner.id, Some(7), "stored id travels with the winner");

        assert_eq!(plan.synced.len(), 1);
        assert_eq!(plan.synced[0].title, "Edited");
        assert_eq!(plan.synced[0].id, Some(7));
    }

    #[test]
    fn test_tie_goes_to_remote() {
        let same_time = ts(5_000);
        let client = local("https://example.com/a", "Mine", Some(same_time));
        let stored = remote(1, "https://example.com/a", "Theirs", same_time);

        let plan = reconcile(&[client], &[stored]);

        assert_eq!(plan.write_count(), 0);
        assert_eq!(plan.synced.len(), 1);
        assert_eq!(plan.synced[0].title, "Theirs");
    }

    #[test]
    fn test_missing_local_timestamp_never_wins() {
        // Epoch-aged stored copy still beats an untimestamped local edit.
        let client = local("https://example.com/a", "Mine", None);
        let stored = remote(1, "https://example.com/a", "Theirs", ts(1));

        let plan = reconcile(&[client], &[stored]);

        assert_eq!(plan.write_count(), 0);
        assert_eq!(plan.synced[0].title, "Theirs");
    }

    #[test]
    fn test_remote_only_carried_with_no_writes() {
        let stored = remote(3, "https://example.com/other-device", "Elsewhere", ts(9_000));

        let plan = reconcile(&[], &[stored.clone()]);

        assert_eq!(plan.write_count(), 0);
        assert_eq!(plan.synced.len(), 1);
        assert_eq!(plan.synced[0].id, Some(3));
        assert_eq!(plan.synced[0].title, "Elsewhere");
        assert_eq!(plan.synced[0].updated_at, Some(stored.updated_at));
    }

    #[test]
    fn test_local_only_scheduled_as_create() {
        let fresh = local("https://example.com/new", "Unsent", Some(ts(100)));

        let plan = reconcile(&[fresh.clone()], &[]);

        assert_eq!(plan.creates, vec![fresh.clone()]);
        assert_eq!(plan.updates.len(), 0);
        assert_eq!(plan.synced, vec![fresh]);
        assert_eq!(plan.synced[0].id, None, "no id until the store assigns one");
    }

    #[test]
    fn test_concrete_stale_local_scenario() {
        let t0 = ts(1_000);
        let t1 = ts(2_000);
        let client = local("https://example.com/u1", "Old", Some(t0));
        let stored = remote(1, "https://example.com/u1", "New", t1);

        let plan = reconcile(&[client], &[stored]);

        assert_eq!(plan.write_count(), 0, "stale local edit schedules nothing");
        assert_eq!(plan.synced.len(), 1);
        assert_eq!(plan.synced[0].id, Some(1));
        assert_eq!(plan.synced[0].title, "New");
    }

    #[test]
    fn test_duplicate_local_urls_planned_separately() {
        let first = local("https://example.com/dup", "First copy", None);
        let second = local("https://example.com/dup", "Second copy", None);

        let plan = reconcile(&[first, second], &[]);

        // Both land in the plan; the store's uniqueness rule decides later.
        assert_eq!(plan.creates.len(), 2);
        assert_eq!(plan.synced.len(), 2);
    }

    #[test]
    fn test_merge_order_is_local_then_remote_only() {
        let client = vec![
            local("https://example.com/a", "A", None),
            local("https://example.com/b", "B", None),
        ];
        let stored = vec![
            remote(1, "https://example.com/b", "B stored", ts(10)),
            remote(2, "https://example.com/z", "Z", ts(10)),
        ];

        let plan = reconcile(&client, &stored);

        let titles: Vec<&str> = plan.synced.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B stored", "Z"]);
    }

    #[test]
    fn test_empty_inputs() {
        let plan = reconcile(&[], &[]);
        assert_eq!(plan, MergePlan::default());
    }
}
