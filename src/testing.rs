//! Test doubles for the provider seams and store fixtures.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use crate::ai::EmbeddingProvider;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::FeedSource;
use crate::models::{Feed, FeedEntry, Item, NewFeed, NewItem};

pub async fn temp_repository() -> (TempDir, Arc<Repository>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.db");
    let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
    (dir, Arc::new(repo))
}

pub async fn seed_feed(repo: &Repository) -> Feed {
    repo.add_feed(NewFeed {
        url: "https://feed.example/rss".to_string(),
        display_name: "Example".to_string(),
    })
    .await
    .unwrap()
}

/// Inserts an item published `hours_ago` hours ago and returns the stored row.
pub async fn insert_item(
    repo: &Repository,
    feed_id: i64,
    url: &str,
    title: &str,
    hours_ago: i64,
) -> Item {
    let id = repo
        .add_item(NewItem {
            feed_id,
            title: title.to_string(),
            url: url.to_string(),
            body: "Full body".to_string(),
            summary: "All about the release".to_string(),
            published_at: Utc::now() - Duration::hours(hours_ago),
        })
        .await
        .unwrap();
    repo.get_item(id).await.unwrap().unwrap()
}

pub fn entry(title: &str, link: &str, published_at: Option<DateTime<Utc>>) -> FeedEntry {
    FeedEntry {
        title: title.to_string(),
        link: link.to_string(),
        body: None,
        summary: Some(format!("About {}", title)),
        published_at,
        updated_at: None,
    }
}

/// Returns canned vectors per text and records every request.
/// Texts with no vector (and no fallback) fail like an unreachable provider.
#[derive(Default)]
pub struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    calls: Mutex<Vec<String>>,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = Some(vector);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, text: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == text).count()
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());
        self.vectors
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| AppError::Embedding(format!("no vector for '{}'", text)))
    }
}

#[derive(Default)]
pub struct StubFeedSource {
    entries: HashMap<String, Vec<FeedEntry>>,
    failing: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl StubFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(mut self, url: &str, entries: Vec<FeedEntry>) -> Self {
        self.entries.insert(url.to_string(), entries);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for StubFeedSource {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(AppError::FeedFetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.entries.get(url).cloned().unwrap_or_default())
    }
}
