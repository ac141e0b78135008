use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub body: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    /// 0.0 means "not scored yet" (or no signal).
    pub relevance_score: f64,
}

impl Item {
    /// Text sent to the embedding provider when scoring this item.
    pub fn scoring_text(&self) -> String {
        let description = if self.summary.is_empty() {
            &self.body
        } else {
            &self.summary
        };
        format!("{}. {}", self.title, description)
    }
}

/// Candidate row produced by ingestion. `published_at` is mandatory: entries
/// without a usable timestamp never become a `NewItem`.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub body: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
}

/// A normalized entry as handed over by a feed source, before conversion.
#[derive(Debug, Clone, Default)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub body: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
