use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Feed, Interest, Item, NewFeed, NewInterest, NewItem};

use super::schema::SCHEMA;

const ITEM_COLUMNS: &str =
    "i.id, i.feed_id, i.title, i.url, i.body, i.summary, i.published_at, i.fetched_at, i.relevance_score";

/// Durable store for feeds, items, interests and read markers.
///
/// All uniqueness rules (feed url, item url, interest description) are
/// enforced here; each write is a single statement so an interrupted batch
/// never leaves a half-written item behind.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Feed operations

    pub async fn add_feed(&self, feed: NewFeed) -> Result<Feed> {
        let created_at = Utc::now().trunc_subsecs(0);
        let created = to_db_time(&created_at);
        let url = feed.url.clone();
        let display_name = feed.display_name.clone();

        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO feeds (url, display_name, enabled, created_at) VALUES (?1, ?2, 1, ?3)",
                    params![url, display_name, created],
                )?;
                Ok((inserted > 0).then(|| conn.last_insert_rowid()))
            })
            .await?;

        let id = id.ok_or_else(|| AppError::FeedExists(feed.url.clone()))?;

        Ok(Feed {
            id,
            url: feed.url,
            display_name: feed.display_name,
            enabled: true,
            created_at,
        })
    }

    /// Feeds ordered by creation time, most recent first.
    pub async fn list_feeds(&self, enabled_only: bool) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(move |conn| {
                let sql = if enabled_only {
                    "SELECT id, url, display_name, enabled, created_at FROM feeds WHERE enabled = 1 ORDER BY created_at DESC, id DESC"
                } else {
                    "SELECT id, url, display_name, enabled, created_at FROM feeds ORDER BY created_at DESC, id DESC"
                };
                let mut stmt = conn.prepare(sql)?;
                let feeds = stmt
                    .query_map([], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    /// Returns false when no feed has this id.
    pub async fn set_feed_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE feeds SET enabled = ?1 WHERE id = ?2",
                    params![enabled, id],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    /// Deletes a feed together with all of its items.
    pub async fn delete_feed(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    // Item operations

    /// Pure insert: an item whose url is already stored is rejected with
    /// `AppError::DuplicateItem` and the stored row is left untouched.
    pub async fn add_item(&self, item: NewItem) -> Result<i64> {
        let url = item.url.clone();
        let fetched_at = to_db_time(&Utc::now());

        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT OR IGNORE INTO items (feed_id, title, url, body, summary, published_at, fetched_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        item.feed_id,
                        item.title,
                        item.url,
                        item.body,
                        item.summary,
                        to_db_time(&item.published_at),
                        fetched_at,
                    ],
                )?;
                Ok((inserted > 0).then(|| conn.last_insert_rowid()))
            })
            .await?;

        id.ok_or(AppError::DuplicateItem(url))
    }

    pub async fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let item = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.id = ?1");
                let item = conn
                    .query_row(&sql, params![id], item_from_row)
                    .optional()?;
                Ok(item)
            })
            .await?;
        Ok(item)
    }

    /// The unread working set: unread items published within `max_age`,
    /// highest relevance first, ties broken by recency.
    pub async fn unread_items(&self, max_age: Duration) -> Result<Vec<Item>> {
        let cutoff = to_db_time(&(Utc::now() - max_age));

        let items = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    r#"SELECT {ITEM_COLUMNS}
                       FROM items i
                       LEFT JOIN read_markers r ON r.item_id = i.id
                       WHERE r.item_id IS NULL AND i.published_at >= ?1
                       ORDER BY i.relevance_score DESC, i.published_at DESC, i.id DESC"#
                );
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params![cutoff], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    /// Idempotent: marking twice, or marking an item that was already
    /// purged, is a no-op.
    pub async fn mark_read(&self, item_id: i64) -> Result<()> {
        let read_at = to_db_time(&Utc::now());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO read_markers (item_id, read_at) SELECT id, ?2 FROM items WHERE id = ?1",
                    params![item_id, read_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Deletes every item carrying a read marker. Returns the number removed.
    pub async fn purge_read(&self) -> Result<usize> {
        let removed = self
            .conn
            .call(|conn| {
                let removed = conn.execute(
                    "DELETE FROM items WHERE id IN (SELECT item_id FROM read_markers)",
                    [],
                )?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    /// Deletes every item published before `now - max_age`, read or not.
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let cutoff = to_db_time(&(Utc::now() - max_age));
        let removed = self
            .conn
            .call(move |conn| {
                let removed =
                    conn.execute("DELETE FROM items WHERE published_at < ?1", params![cutoff])?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    /// Last writer wins.
    pub async fn update_relevance(&self, item_id: i64, score: f64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE items SET relevance_score = ?1 WHERE id = ?2",
                    params![score, item_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn count_items(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    // Interest operations

    pub async fn list_interests(&self) -> Result<Vec<Interest>> {
        let interests = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT id, description, weight, embedding FROM interests ORDER BY id")?;
                let interests = stmt
                    .query_map([], interest_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(interests)
            })
            .await?;
        Ok(interests)
    }

    /// Returns the new id, or `None` when an interest with exactly the same
    /// description already exists.
    pub async fn add_interest(&self, interest: NewInterest) -> Result<Option<i64>> {
        if !interest.weight.is_finite() || interest.weight < 0.0 {
            return Err(AppError::InvalidInterest(format!(
                "weight must be a non-negative number, got {}",
                interest.weight
            )));
        }

        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT INTO interests (description, weight)
                       SELECT ?1, ?2
                       WHERE NOT EXISTS (SELECT 1 FROM interests WHERE description = ?1)"#,
                    params![interest.description, interest.weight],
                )?;
                Ok((inserted > 0).then(|| conn.last_insert_rowid()))
            })
            .await?;
        Ok(id)
    }

    /// Caches a computed embedding on the interest row.
    pub async fn set_interest_embedding(&self, interest_id: i64, embedding: &[f32]) -> Result<()> {
        let encoded = serde_json::to_string(embedding)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE interests SET embedding = ?1 WHERE id = ?2",
                    params![encoded, interest_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Fixed-width UTC form, so text ordering in SQL matches time ordering.
fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })
}

fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        url: row.get(1)?,
        display_name: row.get(2)?,
        enabled: row.get::<_, i64>(3)? != 0,
        created_at: timestamp_column(row, 4)?,
    })
}

fn item_from_row(row: &Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        body: row.get(4)?,
        summary: row.get(5)?,
        published_at: timestamp_column(row, 6)?,
        fetched_at: timestamp_column(row, 7)?,
        relevance_score: row.get(8)?,
    })
}

fn interest_from_row(row: &Row) -> rusqlite::Result<Interest> {
    let id: i64 = row.get(0)?;
    let embedding = row
        .get::<_, Option<String>>(3)?
        .and_then(|raw| match serde_json::from_str::<Vec<f32>>(&raw) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached embedding for interest {}: {}", id, e);
                None
            }
        });

    Ok(Interest {
        id,
        description: row.get(1)?,
        weight: row.get(2)?,
        embedding,
    })
}
