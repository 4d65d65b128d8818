//! Recommendation engine (C10): selects unused curated pairs for essay
//! seeding by tier priority, blended with a diversity score so the same
//! source notes don't dominate every recommendation.
//!
//! Grounded on `analysis::ResultMerger`'s score-blend-then-sort shape,
//! adapted to the tier-priority query pattern spec §4.10 describes.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::model::{QualityTier, RawNoteId, ThoughtId, ThoughtPair};
use crate::store::SqliteStore;

/// Weight given to the diversity component in the final blended score
/// (spec §4.10 step 3: `final_score = claude_score*(1-w) + diversity*100*w`).
const DEFAULT_DIVERSITY_WEIGHT: f64 = 0.3;

const TIER_PRIORITY: [QualityTier; 3] = [QualityTier::Excellent, QualityTier::Premium, QualityTier::Standard];

pub struct RecommendationEngine {
    store: Arc<SqliteStore>,
    diversity_weight: f64,
}

impl RecommendationEngine {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            diversity_weight: DEFAULT_DIVERSITY_WEIGHT,
        }
    }

    pub fn with_diversity_weight(mut self, weight: f64) -> Self {
        self.diversity_weight = weight;
        self
    }

    /// Returns up to `limit` unused pairs, tier-prioritized and
    /// diversity-blended (spec §4.10).
    #[instrument(skip(self))]
    pub async fn recommend(&self, limit: u32) -> crate::error::SerendipityResult<Vec<ThoughtPair>> {
        let fetch_limit = limit * 2;
        let mut pool = Vec::new();
        for tier in TIER_PRIORITY {
            pool.extend(self.store.list_unused_pairs_by_tier(tier, fetch_limit)?);
        }

        // Need each pair's source-note ids for the diversity computation;
        // the store's `ThoughtPair` rows don't carry them, so look them up
        // via the thought ids that make up each pair.
        let thought_ids: Vec<ThoughtId> = pool.iter().flat_map(|p| [p.pair.a, p.pair.b]).collect();
        let thoughts = self.store.get_thoughts(&thought_ids)?;

        let mut note_counts: HashMap<RawNoteId, usize> = HashMap::new();
        for pair in &pool {
            if let Some(a) = thoughts.get(&pair.pair.a) {
                *note_counts.entry(a.raw_note_id.clone()).or_insert(0) += 1;
            }
            if let Some(b) = thoughts.get(&pair.pair.b) {
                *note_counts.entry(b.raw_note_id.clone()).or_insert(0) += 1;
            }
        }

        let mut scored: Vec<(f64, ThoughtPair)> = pool
            .into_iter()
            .map(|pair| {
                let count_a = thoughts.get(&pair.pair.a).map(|t| note_counts[&t.raw_note_id]).unwrap_or(1);
                let count_b = thoughts.get(&pair.pair.b).map(|t| note_counts[&t.raw_note_id]).unwrap_or(1);
                let diversity_score = 1.0 / (count_a + count_b) as f64;
                let final_score = pair.claude_score as f64 * (1.0 - self.diversity_weight)
                    + diversity_score * 100.0 * self.diversity_weight;
                (final_score, pair)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        scored.truncate(limit as usize);
        Ok(scored.into_iter().map(|(_, pair)| pair).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PairKey, RawNote};
    use chrono::Utc;
    use std::collections::HashMap as StdHashMap;

    async fn store_with_pairs() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let note = RawNote {
            id: "p1".into(),
            title: "note".to_string(),
            content: Some("body".to_string()),
            properties: StdHashMap::new(),
            external_created_time: Utc::now(),
            external_last_edited_time: Utc::now(),
            imported_time: Utc::now(),
            is_deleted: false,
            deleted_at: None,
        };
        store.upsert_raw_note(&note).unwrap();
        store
            .insert_thought_units(
                &note.id,
                &[
                    ("claim one is long enough to pass validation".to_string(), None),
                    ("claim two is long enough to pass validation".to_string(), None),
                    ("claim three is long enough to pass validation".to_string(), None),
                    ("claim four is long enough to pass validation".to_string(), None),
                ],
                Utc::now(),
            )
            .unwrap();
        let now = Utc::now();
        store
            .insert_candidates(
                &[
                    (PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap(), 0.1, note.id.clone(), note.id.clone()),
                    (PairKey::new(ThoughtId(3), ThoughtId(4)).unwrap(), 0.1, note.id.clone(), note.id.clone()),
                ],
                now,
            )
            .unwrap();
        let pending = store.list_pending_candidates(None, None, 10).unwrap();
        store.update_candidate_score(pending[0].id, 96, "excellent link", now).unwrap();
        store.update_candidate_score(pending[1].id, 70, "standard link", now).unwrap();
        store
            .move_to_thought_pairs(&[pending[0].id, pending[1].id])
            .unwrap();
        store
    }

    #[tokio::test]
    async fn recommends_prioritizing_higher_tiers() {
        let store = store_with_pairs().await;
        let engine = RecommendationEngine::new(store);
        let recs = engine.recommend(2).await.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].quality_tier, QualityTier::Excellent);
    }
}
