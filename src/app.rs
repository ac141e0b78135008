use std::path::Path;
use std::sync::Arc;

use chrono::Duration;

use crate::ai::{RelevanceScorer, ScoringReport};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{parse_opml_file, IngestReport, Ingestor};
use crate::models::{Feed, Item, NewFeed, NewInterest};
use crate::services::RaindropClient;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub ingest: IngestReport,
    pub scoring: ScoringReport,
    pub expired: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingSummary {
    pub expired: usize,
    pub purged_read: usize,
}

/// Drives the item lifecycle: ingest, score, surface, consume and expire.
///
/// Every step runs sequentially on the caller's task; scoring only starts
/// once ingestion has finished and expiry only once scoring has.
pub struct App {
    repository: Arc<Repository>,
    ingestor: Ingestor,
    scorer: RelevanceScorer,
    raindrop: Option<RaindropClient>,
    max_age: Duration,
}

impl App {
    pub fn new(
        repository: Arc<Repository>,
        ingestor: Ingestor,
        scorer: RelevanceScorer,
        raindrop: Option<RaindropClient>,
        max_age: Duration,
    ) -> Self {
        Self {
            repository,
            ingestor,
            scorer,
            raindrop,
            max_age,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Adds configured feeds and interests that the store does not know yet.
    pub async fn sync_config(&self, config: &Config) -> Result<()> {
        for feed in &config.feeds {
            let new_feed = NewFeed {
                url: feed.url.clone(),
                display_name: feed.name.clone(),
            };
            match self.repository.add_feed(new_feed).await {
                Ok(feed) => tracing::info!("Added feed {}", feed.url),
                Err(AppError::FeedExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        for interest in &config.interests {
            self.repository
                .add_interest(NewInterest::new(interest.description.clone(), interest.weight))
                .await?;
        }

        Ok(())
    }

    /// Ordered unread working set within the age window.
    pub async fn working_set(&self) -> Result<Vec<Item>> {
        self.repository.unread_items(self.max_age).await
    }

    pub async fn item(&self, item_id: i64) -> Result<Item> {
        self.repository
            .get_item(item_id)
            .await?
            .ok_or(AppError::ItemNotFound(item_id))
    }

    /// Fetch new content: ingest, score the new items, then expire old ones.
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let ingest = self.ingestor.fetch_all_enabled().await?;
        let scoring = self.scorer.score_all_unscored(self.max_age).await?;
        let expired = self.repository.purge_older_than(self.max_age).await?;

        Ok(RefreshSummary {
            ingest,
            scoring,
            expired,
        })
    }

    /// Marks an item read and immediately purges every read item.
    pub async fn consume(&self, item_id: i64) -> Result<usize> {
        self.repository.mark_read(item_id).await?;
        self.repository.purge_read().await
    }

    /// Expires old items, drops read ones and returns the refreshed working set.
    pub async fn housekeeping(&self) -> Result<(HousekeepingSummary, Vec<Item>)> {
        let expired = self.repository.purge_older_than(self.max_age).await?;
        let purged_read = self.repository.purge_read().await?;
        let items = self.working_set().await?;

        Ok((
            HousekeepingSummary {
                expired,
                purged_read,
            },
            items,
        ))
    }

    pub async fn add_feed(&self, feed: NewFeed) -> Result<Feed> {
        self.repository.add_feed(feed).await
    }

    /// Returns false when an interest with the same description exists.
    pub async fn add_interest(&self, description: &str, weight: f64) -> Result<bool> {
        let id = self
            .repository
            .add_interest(NewInterest::new(description, weight))
            .await?;
        Ok(id.is_some())
    }

    /// Sends an item to Raindrop.io. The item itself is left untouched.
    pub async fn save_to_raindrop(&self, item_id: i64) -> Result<i64> {
        let Some(raindrop) = &self.raindrop else {
            return Err(AppError::Config("raindrop_token is not configured".to_string()));
        };

        let item = self.item(item_id).await?;
        let raindrop_id = raindrop.save_item(&item).await?;
        tracing::info!("Saved to Raindrop: {}", item.url);
        Ok(raindrop_id)
    }

    /// Imports the feeds of an OPML file, then runs a refresh cycle.
    pub async fn import_opml(&self, path: &Path) -> Result<(usize, RefreshSummary)> {
        let feeds = parse_opml_file(path)?;

        let mut added = 0;
        for feed in feeds {
            match self.repository.add_feed(feed).await {
                Ok(_) => added += 1,
                Err(AppError::FeedExists(url)) => {
                    tracing::debug!("Feed already present: {}", url);
                }
                Err(e) => return Err(e),
            }
        }

        let summary = self.refresh().await?;
        Ok((added, summary))
    }
}
