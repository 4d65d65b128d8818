//! Candidate miner (C8): two complementary ways to surface pairs into
//! `pair_candidates` — a distance-table query over a similarity band, and a
//! keyset-paged sampling strategy when the table isn't populated yet, with
//! a top-k vector-search fallback when neither applies. Also holds the
//! initial diversity sampler recovered from `sampling.py`.
//!
//! Grounded on `store::sqlite::SqliteStore`'s paging/keyset helpers for the
//! query shapes, and on `storage::sqlite_vec` for the vector fallback.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::error::{SerendipityError, SerendipityResult};
use crate::model::{MiningProgress, MiningStatus, PairCandidate, PairKey, RawNoteId, ThoughtId};
use crate::store::SqliteStore;

/// Max allowed width of a similarity band (spec §4.8's `RangeMisconfiguration`).
const MAX_BAND_WIDTH: f32 = 0.8;

/// Page size for the distance-table query path.
const QUERY_PAGE_SIZE: u32 = 1000;

/// Safety cap on total candidates surfaced by one mining call.
const SAFETY_CAP: usize = 100_000;

pub struct CandidateMiner {
    store: Arc<SqliteStore>,
}

impl CandidateMiner {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    fn check_band(min_sim: f32, max_sim: f32) -> SerendipityResult<()> {
        if max_sim - min_sim > MAX_BAND_WIDTH {
            return Err(SerendipityError::RangeMisconfiguration { min_sim, max_sim });
        }
        Ok(())
    }

    /// Method A: pages the cached distance table within `[min_sim, max_sim]`
    /// and inserts every row as a pending candidate, 1000 rows at a time, up
    /// to a 100k-row safety cap (spec §4.8).
    #[instrument(skip(self))]
    pub async fn mine_from_distance_table(&self, min_sim: f32, max_sim: f32) -> SerendipityResult<usize> {
        Self::check_band(min_sim, max_sim)?;

        let mut after = None;
        let mut total = 0usize;
        loop {
            let page = self.store.list_distance_pairs_after(min_sim, max_sim, after, QUERY_PAGE_SIZE)?;
            if page.is_empty() {
                break;
            }
            after = Some(page.last().unwrap().0.b);
            total += self.insert_as_candidates(&page)?;
            if total >= SAFETY_CAP || page.len() < QUERY_PAGE_SIZE as usize {
                break;
            }
        }
        Ok(total)
    }

    /// Method B: keyset-paged sampling mining, resumable via `MiningProgress`.
    /// For each batch of `src_batch` source thoughts, samples up to
    /// `dst_sample` destinations deterministically from `seed`, keeps the
    /// top `k` by similarity within `[p_lo, p_hi]` (as raw similarity
    /// fractions of `p_lo/100`..`p_hi/100`), and retries up to `max_rounds`
    /// before giving up on a round that yields nothing.
    #[instrument(skip(self))]
    pub async fn mine_via_sampling(&self, progress: &mut MiningProgress, max_rounds: u32) -> SerendipityResult<usize> {
        let mut total_this_call = 0usize;
        let mut empty_rounds = 0u32;

        while empty_rounds < max_rounds {
            let sources = self
                .store
                .list_embedded_thought_ids_after(progress.last_src_id, progress.src_batch)?;
            if sources.is_empty() {
                progress.status = MiningStatus::Completed;
                break;
            }

            let universe = self.store.list_embedded_thought_ids()?;
            let embeddings = self.store.get_thoughts(&universe)?;
            let p_lo = progress.p_lo as f32 / 100.0;
            let p_hi = progress.p_hi as f32 / 100.0;

            let mut round_candidates = Vec::new();
            for &src in &sources {
                let Some(src_vec) = embeddings.get(&src).and_then(|t| t.embedding.as_deref()) else {
                    continue;
                };
                let mut sampled: Vec<(ThoughtId, f32)> = universe
                    .iter()
                    .filter(|&&dst| dst != src && rand_key(src.0, dst.0, progress.seed) < sample_probability(progress.dst_sample, universe.len()))
                    .filter_map(|&dst| {
                        let dst_vec = embeddings.get(&dst)?.embedding.as_deref()?;
                        let sim = crate::store::cosine_similarity(src_vec, dst_vec);
                        (sim >= p_lo && sim <= p_hi).then_some((dst, sim))
                    })
                    .collect();
                sampled.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
                sampled.truncate(progress.k as usize);
                for (dst, sim) in sampled {
                    if let Some(pair) = PairKey::new(src, dst) {
                        round_candidates.push((pair, sim));
                    }
                }
            }

            progress.last_src_id = sources.last().copied();
            progress.updated_at = Utc::now();

            if round_candidates.is_empty() {
                empty_rounds += 1;
                self.store.save_mining_progress(progress)?;
                continue;
            }
            empty_rounds = 0;
            let inserted = self.insert_as_candidates(&round_candidates)?;
            total_this_call += inserted;
            progress.total_mined += inserted as u64;
            self.store.save_mining_progress(progress)?;

            if total_this_call >= SAFETY_CAP {
                break;
            }
        }

        Ok(total_this_call)
    }

    /// Mines candidates using whichever method applies: the distance table
    /// if it has rows, a direct top-k vector search if it's empty but
    /// thoughts exist, or an error if there's nothing to mine from yet
    /// (spec §4.8 fallback order).
    #[instrument(skip(self))]
    pub async fn mine(&self, min_sim: f32, max_sim: f32) -> SerendipityResult<usize> {
        Self::check_band(min_sim, max_sim)?;

        if self.store.count_distance_rows()? > 0 {
            return self.mine_from_distance_table(min_sim, max_sim).await;
        }

        let universe = self.store.list_embedded_thought_ids()?;
        if universe.is_empty() {
            return Err(SerendipityError::NotFound(
                "no embedded thoughts available to mine".to_string(),
            ));
        }

        warn!("distance table empty, falling back to direct top-k vector search");
        let pairs = self.store.find_similar_pairs_topk(min_sim, max_sim, 10, SAFETY_CAP)?;
        self.insert_as_candidates(&pairs)
    }

    fn insert_as_candidates(&self, pairs: &[(PairKey, f32)]) -> SerendipityResult<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let ids: Vec<ThoughtId> = pairs.iter().flat_map(|(p, _)| [p.a, p.b]).collect();
        let thoughts = self.store.get_thoughts(&ids)?;

        let rows: Vec<(PairKey, f32, RawNoteId, RawNoteId)> = pairs
            .iter()
            .filter_map(|(pair, sim)| {
                let a = thoughts.get(&pair.a)?;
                let b = thoughts.get(&pair.b)?;
                Some((*pair, *sim, a.raw_note_id.clone(), b.raw_note_id.clone()))
            })
            .collect();

        Ok(self.store.insert_candidates(&rows, Utc::now())?)
    }
}

/// Deterministic per-(src, dst, seed) sample key in `[0, 1)`, replacing a
/// stateful PRNG draw so mining progress is resumable without replaying
/// prior rounds.
fn rand_key(src_id: i64, dst_id: i64, seed: u64) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    src_id.hash(&mut hasher);
    dst_id.hash(&mut hasher);
    seed.hash(&mut hasher);
    (hasher.finish() as f64) / (u64::MAX as f64)
}

fn sample_probability(dst_sample: u32, universe_size: usize) -> f64 {
    if universe_size == 0 {
        return 0.0;
    }
    (dst_sample as f64 / universe_size as f64).min(1.0)
}

/// Initial diversity sampler (SPEC_FULL §4.8, recovered from
/// `sampling.py::SamplingStrategy.sample_initial`): splits an already
/// materialized candidate pool into low/mid/high similarity bands in fixed
/// 40/35/25 ratios of `target_count`, then draws from each band via
/// round-robin diversity sampling grouped by `(raw_note_id_a, raw_note_id_b)`
/// so no single repeated note-pair dominates the sample.
pub fn sample_initial(pool: &[PairCandidate], target_count: usize, seed: u64) -> Vec<PairCandidate> {
    if pool.len() <= target_count {
        return pool.to_vec();
    }

    let mut sorted: Vec<&PairCandidate> = pool.iter().collect();
    sorted.sort_by(|a, b| a.similarity.partial_cmp(&b.similarity).unwrap());

    let third = sorted.len() / 3;
    let low_band = &sorted[..third];
    let mid_band = &sorted[third..third * 2];
    let high_band = &sorted[third * 2..];

    let low_target = (target_count as f64 * 0.40).round() as usize;
    let mid_target = (target_count as f64 * 0.35).round() as usize;
    let high_target = target_count.saturating_sub(low_target + mid_target);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut result = Vec::with_capacity(target_count);
    result.extend(diverse_sample(low_band, low_target, &mut rng));
    result.extend(diverse_sample(mid_band, mid_target, &mut rng));
    result.extend(diverse_sample(high_band, high_target, &mut rng));
    result
}

/// Groups by `(raw_note_id_a, raw_note_id_b)`, shuffles within each group,
/// then draws round-robin across groups until `target` items are picked.
fn diverse_sample(band: &[&PairCandidate], target: usize, rng: &mut StdRng) -> Vec<PairCandidate> {
    if band.len() <= target {
        return band.iter().map(|c| (*c).clone()).collect();
    }

    let mut groups: HashMap<(RawNoteId, RawNoteId), Vec<&PairCandidate>> = HashMap::new();
    for c in band {
        groups
            .entry((c.raw_note_id_a.clone(), c.raw_note_id_b.clone()))
            .or_default()
            .push(c);
    }
    let mut group_lists: Vec<Vec<&PairCandidate>> = groups.into_values().collect();
    for g in group_lists.iter_mut() {
        g.shuffle(rng);
    }
    group_lists.sort_by_key(|g| g.len());

    let mut result = Vec::with_capacity(target);
    let mut cursor = 0usize;
    while result.len() < target && group_lists.iter().any(|g| cursor < g.len()) {
        for g in group_lists.iter() {
            if result.len() >= target {
                break;
            }
            if let Some(candidate) = g.get(cursor) {
                result.push((*candidate).clone());
            }
        }
        cursor += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LlmStatus, RawNote};
    use std::collections::HashMap as StdHashMap;

    fn seeded_store() -> Arc<SqliteStore> {
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
        store.set_thought_embedding(ids[1], &[0.6, 0.8, 0.0], "test").unwrap();
        store.set_thought_embedding(ids[2], &[0.0, 1.0, 0.0], "test").unwrap();
        store
    }

    #[tokio::test]
    async fn mine_rejects_an_overly_wide_band() {
        let store = seeded_store();
        let miner = CandidateMiner::new(store);
        let err = miner.mine(0.0, 0.9).await.unwrap_err();
        assert!(matches!(err, SerendipityError::RangeMisconfiguration { .. }));
    }

    #[tokio::test]
    async fn mine_falls_back_to_topk_when_distance_table_is_empty() {
        let store = seeded_store();
        let miner = CandidateMiner::new(store.clone());
        let inserted = miner.mine(0.0, 0.7).await.unwrap();
        assert!(inserted > 0);
        assert_eq!(store.list_pending_candidates(None, None, 100).unwrap().len(), inserted);
    }

    #[tokio::test]
    async fn mine_from_distance_table_pages_through_results() {
        let store = seeded_store();
        store.build_distance_table_batch(0, 10).unwrap();
        let miner = CandidateMiner::new(store.clone());
        let inserted = miner.mine_from_distance_table(0.0, 0.8).await.unwrap();
        assert!(inserted > 0);
    }

    fn candidate(a_note: &str, b_note: &str, sim: f32) -> PairCandidate {
        PairCandidate {
            id: crate::model::CandidateId(0),
            pair: PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap(),
            similarity: sim,
            raw_note_id_a: a_note.into(),
            raw_note_id_b: b_note.into(),
            llm_status: LlmStatus::Pending,
            llm_attempts: 0,
            llm_score: None,
            connection_reason: None,
            created_at: Utc::now(),
            last_evaluated_at: None,
            evaluation_error: None,
        }
    }

    #[test]
    fn sample_initial_returns_pool_unchanged_when_already_small() {
        let pool = vec![candidate("a", "b", 0.1), candidate("c", "d", 0.5)];
        let sampled = sample_initial(&pool, 10, 42);
        assert_eq!(sampled.len(), 2);
    }

    #[test]
    fn sample_initial_caps_at_target_count() {
        let pool: Vec<PairCandidate> = (0..100)
            .map(|i| candidate(&format!("a{i}"), &format!("b{i}"), i as f32 / 100.0))
            .collect();
        let sampled = sample_initial(&pool, 20, 7);
        assert!(sampled.len() <= 20);
        assert!(!sampled.is_empty());
    }
}
