use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Feed, FeedEntry, NewItem};

use super::FeedSource;

/// Characters of body kept when a summary has to be synthesized.
const SUMMARY_LIMIT: usize = 500;
const MAX_CONCURRENT_FETCHES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub new_items: usize,
    pub feeds_fetched: usize,
    pub feeds_failed: usize,
}

/// Converts a normalized entry into an insert candidate.
///
/// Entries without a published or updated timestamp, or without a link, are
/// dropped rather than stored with made-up values.
pub fn to_new_item(feed_id: i64, entry: FeedEntry) -> Option<NewItem> {
    let published_at = entry.published_at.or(entry.updated_at)?;

    let url = entry.link.trim().to_string();
    if url.is_empty() {
        return None;
    }

    let body = entry.body.filter(|b| !b.trim().is_empty());
    let summary = entry.summary.filter(|s| !s.trim().is_empty());

    let summary_text = match (&summary, &body) {
        (Some(summary), _) => summary.clone(),
        (None, Some(body)) => truncate_summary(body),
        (None, None) => String::new(),
    };
    let body_text = body.or(summary).unwrap_or_default();

    let title = if entry.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        entry.title
    };

    Some(NewItem {
        feed_id,
        title,
        url,
        body: body_text,
        summary: summary_text,
        published_at,
    })
}

fn truncate_summary(body: &str) -> String {
    match body.char_indices().nth(SUMMARY_LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Pulls entries from feed sources into the store.
pub struct Ingestor {
    repository: Arc<Repository>,
    source: Arc<dyn FeedSource>,
}

impl Ingestor {
    pub fn new(repository: Arc<Repository>, source: Arc<dyn FeedSource>) -> Self {
        Self { repository, source }
    }

    /// Fetches one feed and inserts its new items. Already-stored urls are
    /// skipped and not counted.
    pub async fn fetch_and_store(&self, feed: &Feed) -> Result<usize> {
        let entries = self
            .source
            .fetch_entries(&feed.url)
            .await
            .map_err(|e| match e {
                AppError::FeedFetch { .. } => e,
                e if e.is_provider_failure() => AppError::FeedFetch {
                    url: feed.url.clone(),
                    reason: e.to_string(),
                },
                e => e,
            })?;

        let mut new_items = 0;
        for entry in entries {
            let Some(candidate) = to_new_item(feed.id, entry) else {
                tracing::debug!("Skipping undated or unlinked entry in {}", feed.url);
                continue;
            };

            match self.repository.add_item(candidate).await {
                Ok(_) => new_items += 1,
                Err(AppError::DuplicateItem(url)) => {
                    tracing::trace!("Already stored: {}", url);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!("Fetched {} new items from {}", new_items, feed.display_name);
        Ok(new_items)
    }

    /// Fetches every enabled feed. A feed that cannot be fetched is logged
    /// and counted; the others still proceed.
    pub async fn fetch_all_enabled(&self) -> Result<IngestReport> {
        let feeds = self.repository.list_feeds(true).await?;

        let results: Vec<(Feed, Result<usize>)> = stream::iter(feeds)
            .map(|feed| async move {
                let result = self.fetch_and_store(&feed).await;
                (feed, result)
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for (feed, result) in results {
            match result {
                Ok(count) => {
                    report.feeds_fetched += 1;
                    report.new_items += count;
                }
                Err(e) if e.is_provider_failure() => {
                    tracing::warn!("Error fetching feed {}: {}", feed.display_name, e);
                    report.feeds_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Fetched {} new items from {} feeds ({} failed)",
            report.new_items,
            report.feeds_fetched,
            report.feeds_failed
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::models::NewFeed;
    use crate::testing::{entry, temp_repository, StubFeedSource};

    #[test]
    fn prefers_published_over_updated() {
        let published = Utc::now() - Duration::hours(3);
        let mut e = entry("A", "https://e/a", Some(published));
        e.updated_at = Some(Utc::now());

        let item = to_new_item(1, e).unwrap();
        assert_eq!(item.published_at, published);
    }

    #[test]
    fn falls_back_to_updated() {
        let updated = Utc::now() - Duration::hours(1);
        let mut e = entry("A", "https://e/a", None);
        e.updated_at = Some(updated);

        assert_eq!(to_new_item(1, e).unwrap().published_at, updated);
    }

    #[test]
    fn drops_entries_without_timestamp_or_link() {
        assert!(to_new_item(1, entry("A", "https://e/a", None)).is_none());
        assert!(to_new_item(1, entry("A", "  ", Some(Utc::now()))).is_none());
    }

    #[test]
    fn body_preferred_and_summary_kept() {
        let mut e = entry("A", "https://e/a", Some(Utc::now()));
        e.body = Some("full body".to_string());
        e.summary = Some("short".to_string());

        let item = to_new_item(1, e).unwrap();
        assert_eq!(item.body, "full body");
        assert_eq!(item.summary, "short");
    }

    #[test]
    fn summary_used_as_body_when_body_missing() {
        let mut e = entry("", "https://e/a", Some(Utc::now()));
        e.summary = Some("only summary".to_string());

        let item = to_new_item(1, e).unwrap();
        assert_eq!(item.body, "only summary");
        assert_eq!(item.summary, "only summary");
        assert_eq!(item.title, "Untitled");
    }

    #[test]
    fn long_body_is_truncated_into_summary() {
        let mut e = entry("A", "https://e/a", Some(Utc::now()));
        e.body = Some("é".repeat(600));
        e.summary = None;

        let item = to_new_item(1, e).unwrap();
        assert_eq!(item.body.chars().count(), 600);
        assert!(item.summary.ends_with("..."));
        assert_eq!(item.summary.chars().count(), 503);

        let mut exact = entry("B", "https://e/b", Some(Utc::now()));
        exact.body = Some("x".repeat(500));
        exact.summary = None;
        let item = to_new_item(1, exact).unwrap();
        assert_eq!(item.summary, "x".repeat(500));

        let mut short = entry("C", "https://e/c", Some(Utc::now()));
        short.body = Some("tiny".to_string());
        short.summary = None;
        assert_eq!(to_new_item(1, short).unwrap().summary, "tiny");
    }

    #[tokio::test]
    async fn second_fetch_of_same_content_adds_nothing() {
        let (_dir, repo) = temp_repository().await;
        let feed = repo
            .add_feed(NewFeed {
                url: "https://feed.example/rss".to_string(),
                display_name: "Feed".to_string(),
            })
            .await
            .unwrap();

        let now = Utc::now();
        let source = Arc::new(StubFeedSource::new().with_entries(
            "https://feed.example/rss",
            vec![
                entry("One", "https://e/1", Some(now)),
                entry("Two", "https://e/2", Some(now)),
                entry("Undated", "https://e/3", None),
                entry("One again", "https://e/1", Some(now)),
            ],
        ));
        let ingestor = Ingestor::new(repo.clone(), source);

        assert_eq!(ingestor.fetch_and_store(&feed).await.unwrap(), 2);
        assert_eq!(ingestor.fetch_and_store(&feed).await.unwrap(), 0);
        assert_eq!(repo.count_items().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failing_feed_does_not_block_others() {
        let (_dir, repo) = temp_repository().await;
        for (url, name) in [
            ("https://ok.example/rss", "Ok"),
            ("https://down.example/rss", "Down"),
            ("https://off.example/rss", "Off"),
        ] {
            repo.add_feed(NewFeed {
                url: url.to_string(),
                display_name: name.to_string(),
            })
            .await
            .unwrap();
        }
        let off = repo
            .list_feeds(false)
            .await
            .unwrap()
            .into_iter()
            .find(|f| f.display_name == "Off")
            .unwrap();
        repo.set_feed_enabled(off.id, false).await.unwrap();

        let source = Arc::new(
            StubFeedSource::new()
                .with_entries("https://ok.example/rss", vec![entry("One", "https://e/1", Some(Utc::now()))])
                .with_entries("https://off.example/rss", vec![entry("Hidden", "https://e/2", Some(Utc::now()))])
                .failing("https://down.example/rss"),
        );
        let ingestor = Ingestor::new(repo.clone(), source.clone());

        let report = ingestor.fetch_all_enabled().await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                new_items: 1,
                feeds_fetched: 1,
                feeds_failed: 1,
            }
        );
        assert!(!source.fetched().contains(&"https://off.example/rss".to_string()));
    }
}
