//! Distance engine (C7): builds/maintains the pair-distance table and the
//! distribution cache derived from it, and resolves relative similarity
//! thresholds against that cache.
//!
//! Grounded on `adapter::embedding::EmbeddingSimilarityEnrichment` for the
//! cosine-similarity math and `storage::sqlite_vec` for the vector storage
//! shape; orchestration here is new (the teacher has no batch-build loop of
//! its own), sized like `IngestPipeline::run`'s page-batching loop.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

use crate::model::{DistributionCache, Percentiles, ThresholdStrategy};
use crate::store::SqliteStore;

/// Build batches of this many source thoughts at a time (spec §4.7).
const BUILD_BATCH_SIZE: u32 = 200;

/// In-memory cache freshness window (spec §4.7).
const IN_MEMORY_TTL: ChronoDuration = ChronoDuration::minutes(5);

/// On-disk cache freshness window before an unconditional recompute.
const STORED_TTL: ChronoDuration = ChronoDuration::days(7);

/// Recompute if the active note count has drifted by more than this
/// fraction since the cache was calculated.
const DEVIATION_THRESHOLD: f64 = 0.10;

pub struct DistanceEngine {
    store: Arc<SqliteStore>,
    memory_cache: Mutex<Option<(DistributionCache, DateTime<Utc>)>>,
}

impl DistanceEngine {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            memory_cache: Mutex::new(None),
        }
    }

    /// Builds the full distance table from scratch, batching over the
    /// embedded-thought universe until exhausted (spec §4.7 build).
    #[instrument(skip(self))]
    pub async fn build_full(&self) -> crate::error::SerendipityResult<u64> {
        let mut offset = 0u32;
        let mut total_inserted = 0u64;
        loop {
            let inserted = self.store.build_distance_table_batch(offset, BUILD_BATCH_SIZE)?;
            total_inserted += inserted as u64;
            if inserted == 0 {
                break;
            }
            offset += BUILD_BATCH_SIZE;
        }
        info!(total_inserted, "distance table build complete");
        Ok(total_inserted)
    }

    /// Incrementally updates the distance table for newly embedded thoughts,
    /// auto-detecting them when `new_ids` is `None` (spec §4.7 incremental).
    #[instrument(skip(self, new_ids))]
    pub async fn update_incremental(&self, new_ids: Option<&[crate::model::ThoughtId]>) -> crate::error::SerendipityResult<usize> {
        Ok(self.store.update_distance_table_incremental(new_ids)?)
    }

    /// Returns a fresh distribution snapshot, recomputing through the
    /// three-tier cache policy (spec §4.7 statistics):
    /// 1. in-memory cache if younger than 5 minutes,
    /// 2. stored cache if younger than 7 days AND the active-note count
    ///    hasn't drifted by more than 10%,
    /// 3. otherwise recompute from the distance table (or, if that's empty,
    ///    the slow vector fallback) and persist the result.
    #[instrument(skip(self))]
    pub async fn distribution(&self) -> crate::error::SerendipityResult<Option<DistributionCache>> {
        let now = Utc::now();

        if let Some((cached, cached_at)) = self.memory_cache.lock().unwrap().clone() {
            if now - cached_at < IN_MEMORY_TTL {
                return Ok(Some(cached));
            }
        }

        let active_notes = self.store.count_active_notes()?;

        if let Some(stored) = self.store.load_distribution_cache()? {
            let age = now - stored.calculated_at;
            let deviation = if stored.thought_count == 0 {
                1.0
            } else {
                (active_notes as f64 - stored.thought_count as f64).abs() / stored.thought_count as f64
            };
            if age < STORED_TTL && deviation <= DEVIATION_THRESHOLD {
                *self.memory_cache.lock().unwrap() = Some((stored.clone(), now));
                return Ok(Some(stored));
            }
        }

        self.recompute(now, active_notes).await
    }

    async fn recompute(&self, now: DateTime<Utc>, active_notes: u64) -> crate::error::SerendipityResult<Option<DistributionCache>> {
        let started = std::time::Instant::now();
        let computed = match self.store.calculate_distribution_from_distance_table()? {
            Some(result) => Some(result),
            None => self.store.calculate_similarity_distribution()?,
        };
        let Some((percentiles, mean, stddev, total_pairs)) = computed else {
            return Ok(None);
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        self.store.save_distribution_cache(
            &percentiles,
            mean,
            stddev,
            active_notes,
            total_pairs,
            now,
            duration_ms,
        )?;

        let cache = DistributionCache {
            percentiles,
            mean,
            stddev,
            thought_count: active_notes,
            total_pairs,
            calculated_at: now,
            duration_ms,
        };
        *self.memory_cache.lock().unwrap() = Some((cache.clone(), now));
        Ok(Some(cache))
    }

    /// Resolves a relative threshold strategy against the current
    /// distribution into concrete `(min_sim, max_sim)` bounds (spec §4.7/§4.8).
    pub fn resolve_threshold(&self, strategy: ThresholdStrategy, percentiles: &Percentiles) -> (f32, f32) {
        let (lo, hi) = match strategy {
            ThresholdStrategy::P10P40 => (10, 40),
            ThresholdStrategy::P30P60 => (30, 60),
            ThresholdStrategy::P0P30 => (0, 30),
            ThresholdStrategy::Custom { lo, hi } => (lo, hi),
        };
        (percentiles.get(lo), percentiles.get(hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawNote, ThoughtId};
    use std::collections::HashMap;

    fn seeded_store() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let note = RawNote {
            id: "p1".into(),
            title: "note".to_string(),
            content: Some("body".to_string()),
            properties: HashMap::new(),
            external_created_time: Utc::now(),
            external_last_edited_time: Utc::now(),
            imported_time: Utc::now(),
            is_deleted: false,
            deleted_at: None,
        };
        store.upsert_raw_note(&note).unwrap();
        let ids = store
            .insert_thought_units(
                &note.id,
                &[
                    ("claim number one is long enough indeed".to_string(), None),
                    ("claim number two is also long enough yes".to_string(), None),
                    ("claim number three is long enough as well".to_string(), None),
                ],
                Utc::now(),
            )
            .unwrap();
        store.set_thought_embedding(ids[0], &[1.0, 0.0, 0.0], "test").unwrap();
        store.set_thought_embedding(ids[1], &[0.9, 0.1, 0.0], "test").unwrap();
        store.set_thought_embedding(ids[2], &[0.0, 1.0, 0.0], "test").unwrap();
        store
    }

    #[tokio::test]
    async fn build_full_exhausts_the_universe_in_batches() {
        let store = seeded_store();
        let engine = DistanceEngine::new(store.clone());
        let inserted = engine.build_full().await.unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(store.count_distance_rows().unwrap(), 3);
    }

    #[tokio::test]
    async fn distribution_recomputes_and_then_serves_from_memory() {
        let store = seeded_store();
        let engine = DistanceEngine::new(store.clone());
        engine.build_full().await.unwrap();

        let first = engine.distribution().await.unwrap().expect("should compute a distribution");
        assert_eq!(first.total_pairs, 3);

        // Second call within the TTL window should hit the in-memory cache
        // without recomputing (duration_ms would otherwise differ).
        let second = engine.distribution().await.unwrap().unwrap();
        assert_eq!(second.calculated_at, first.calculated_at);
    }

    #[tokio::test]
    async fn update_incremental_is_a_no_op_with_no_new_ids() {
        let store = seeded_store();
        let engine = DistanceEngine::new(store.clone());
        engine.build_full().await.unwrap();
        let inserted = engine.update_incremental(Some(&[] as &[ThoughtId])).await.unwrap();
        assert_eq!(inserted, 0);
    }
}
