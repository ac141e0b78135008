use std::sync::Arc;

use chrono::Duration;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{Interest, Item};

use super::EmbeddingProvider;

/// Outcome of scoring a single item.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ItemScore {
    pub score: f64,
    /// Interests that contributed to the score.
    pub interests_used: usize,
    /// Interests left out because their embedding could not be obtained.
    pub interests_skipped: usize,
}

/// Outcome of a scoring pass over the unread working set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringReport {
    /// Unscored items found in the working set.
    pub candidates: usize,
    pub scored: usize,
    pub failed: usize,
    pub interests_skipped: usize,
}

/// Cosine similarity in [-1, 1]. Empty, mismatched or zero-length vectors
/// yield 0 so one bad embedding cannot abort a scoring pass.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Scores items against the weighted interest set and caches interest
/// embeddings in the store the first time they are computed.
pub struct RelevanceScorer {
    repository: Arc<Repository>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RelevanceScorer {
    pub fn new(repository: Arc<Repository>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository,
            embedder,
        }
    }

    /// Weighted average of the item's similarity to every usable interest.
    ///
    /// Interests whose embedding cannot be generated are skipped and counted
    /// in `interests_skipped`. With no positive weight the score is 0 and the
    /// provider is never contacted.
    pub async fn score_item(&self, item: &Item, interests: &mut [Interest]) -> Result<ItemScore> {
        if !interests.iter().any(|i| i.weight > 0.0) {
            return Ok(ItemScore::default());
        }

        let item_vector = self.embedder.embed(&item.scoring_text()).await?;

        let mut result = ItemScore::default();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for interest in interests.iter_mut().filter(|i| i.weight > 0.0) {
            if !self.ensure_embedding(interest).await? {
                result.interests_skipped += 1;
                continue;
            }
            let Some(vector) = interest.embedding.as_deref() else {
                continue;
            };

            weighted_sum += cosine_similarity(&item_vector, vector) * interest.weight;
            total_weight += interest.weight;
            result.interests_used += 1;
        }

        if total_weight > 0.0 {
            result.score = weighted_sum / total_weight;
        }

        Ok(result)
    }

    /// Scores every unread item in the window whose score is still 0.
    /// Items that fail are logged and left for the next pass.
    pub async fn score_all_unscored(&self, max_age: Duration) -> Result<ScoringReport> {
        let mut interests = self.repository.list_interests().await?;
        if interests.is_empty() {
            tracing::info!("No interests configured, skipping scoring");
            return Ok(ScoringReport::default());
        }

        let unscored: Vec<Item> = self
            .repository
            .unread_items(max_age)
            .await?
            .into_iter()
            .filter(|item| item.relevance_score == 0.0)
            .collect();

        let mut report = ScoringReport {
            candidates: unscored.len(),
            ..ScoringReport::default()
        };

        for item in &unscored {
            match self.score_item(item, &mut interests).await {
                Ok(outcome) => {
                    report.interests_skipped += outcome.interests_skipped;
                    self.repository
                        .update_relevance(item.id, outcome.score)
                        .await?;
                    report.scored += 1;
                    tracing::debug!(
                        "Scored '{}' at {:.3} against {} interests",
                        item.title,
                        outcome.score,
                        outcome.interests_used
                    );
                }
                Err(e) if e.is_provider_failure() => {
                    tracing::warn!("Failed to score '{}': {}", item.title, e);
                    report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Scored {}/{} items ({} failed)",
            report.scored,
            report.candidates,
            report.failed
        );

        Ok(report)
    }

    /// Makes sure `interest.embedding` is populated, writing a freshly
    /// computed vector through to the store. Returns false when the provider
    /// could not produce one.
    async fn ensure_embedding(&self, interest: &mut Interest) -> Result<bool> {
        if interest.embedding.is_some() {
            return Ok(true);
        }

        match self.embedder.embed(&interest.description).await {
            Ok(vector) => {
                self.repository
                    .set_interest_embedding(interest.id, &vector)
                    .await?;
                interest.embedding = Some(vector);
                Ok(true)
            }
            Err(e) if e.is_provider_failure() => {
                tracing::warn!(
                    "Failed to get embedding for interest '{}': {}",
                    interest.description,
                    e
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
