use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{FeedEntry, NewFeed};

/// Anything that can hand over the normalized entries of a feed URL.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("relevance-reader/1.0")
            .build()?;

        Ok(Self { client })
    }

    /// Discover and create a feed from a URL
    /// If the URL is a direct RSS/Atom feed, parse it directly
    /// If it's an HTML page, look for feed links in <link> tags
    pub async fn discover_feed(&self, url: &str) -> Result<NewFeed> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch URL: HTTP {}", response.status()).into());
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = response.bytes().await?;

        if let Ok(feed) = parser::parse(&bytes[..]) {
            return Ok(NewFeed {
                url: final_url,
                display_name: feed_title(feed.title),
            });
        }

        if content_type.contains("html") || bytes.starts_with(b"<!") || bytes.starts_with(b"<html") {
            let html = String::from_utf8_lossy(&bytes);
            if let Some(feed_url) = find_feed_link(&html, &final_url) {
                let feed_response = self.client.get(&feed_url).send().await?;
                if feed_response.status().is_success() {
                    let feed_bytes = feed_response.bytes().await?;
                    if let Ok(feed) = parser::parse(&feed_bytes[..]) {
                        return Ok(NewFeed {
                            url: feed_url,
                            display_name: feed_title(feed.title),
                        });
                    }
                }
            }
        }

        Err(anyhow::anyhow!("Could not find RSS/Atom feed at {}", url).into())
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::FeedFetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(&bytes[..])?;

        Ok(feed.entries.into_iter().map(normalize_entry).collect())
    }
}

fn feed_title(title: Option<feed_rs::model::Text>) -> String {
    title
        .map(|t| t.content)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled Feed".to_string())
}

fn normalize_entry(entry: Entry) -> FeedEntry {
    FeedEntry {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        link: entry
            .links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone())
            .unwrap_or_default(),
        body: entry.content.and_then(|c| c.body),
        summary: entry.summary.map(|s| s.content),
        published_at: entry.published,
        updated_at: entry.updated,
    }
}

/// Search HTML for an RSS/Atom `<link rel="alternate">`.
fn find_feed_link(html: &str, base_url: &str) -> Option<String> {
    let link_re = Regex::new(
        r#"<link[^>]*rel=["']alternate["'][^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#,
    )
    .ok()?;

    // type before rel, or no rel at all
    let link_re2 =
        Regex::new(r#"<link[^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#)
            .ok()?;

    let href = link_re
        .captures(html)
        .or_else(|| link_re2.captures(html))
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str().to_string())?;

    Some(resolve_url(&href, base_url))
}

fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    url::Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| href.to_string())
}
