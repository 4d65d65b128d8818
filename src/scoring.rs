//! Batch scoring worker (C9): reads pending candidates, scores them in
//! chunks through the LLM, records results, and promotes high scorers into
//! curated pairs.
//!
//! Grounded on `ai_service.py::score_pairs`'s chunk-then-sleep loop and the
//! teacher's `llm_orc::LlmOrcClient`-driven batch pattern.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::llm::{LlmClient, ScoringCandidate};
use crate::model::CandidateId;
use crate::store::SqliteStore;

/// Candidates per LLM call (spec §4.9 step 3, matches `ai_service.py`'s batch size).
const MAX_PAIRS_PER_BATCH: usize = 10;

/// Pause between chunks to stay polite to the provider.
const INTER_CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// `claude_score` at/above this is promoted into `thought_pairs` (spec §9
/// open question (c): treated as a runtime policy knob, defaulted here to
/// the lowest scored tier's floor).
const DEFAULT_PROMOTION_THRESHOLD: u8 = 65;

#[derive(Debug, Default, Clone, Copy)]
pub struct BatchSummary {
    pub evaluated: usize,
    pub migrated: usize,
    pub failed: usize,
}

pub struct BatchEvaluationWorker {
    llm: Arc<dyn LlmClient>,
    store: Arc<SqliteStore>,
    promotion_threshold: u8,
}

impl BatchEvaluationWorker {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<SqliteStore>) -> Self {
        Self {
            llm,
            store,
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
        }
    }

    pub fn with_promotion_threshold(mut self, threshold: u8) -> Self {
        self.promotion_threshold = threshold;
        self
    }

    /// Evaluates up to `max_candidates` pending candidates in the
    /// `[min_sim, max_sim]` band, chunked to `MAX_PAIRS_PER_BATCH`, and
    /// promotes every scored candidate at/above the promotion threshold.
    #[instrument(skip(self))]
    pub async fn run_once(
        &self,
        min_sim: Option<f32>,
        max_sim: Option<f32>,
        max_candidates: u32,
    ) -> crate::error::SerendipityResult<BatchSummary> {
        let pending = self.store.list_pending_candidates(min_sim, max_sim, max_candidates)?;
        let mut summary = BatchSummary::default();

        for chunk in pending.chunks(MAX_PAIRS_PER_BATCH) {
            let thought_ids: Vec<_> = chunk.iter().flat_map(|c| [c.pair.a, c.pair.b]).collect();
            let thoughts = self.store.get_thoughts(&thought_ids)?;

            let scoring_candidates: Vec<ScoringCandidate> = chunk
                .iter()
                .filter_map(|c| {
                    let a = thoughts.get(&c.pair.a)?;
                    let b = thoughts.get(&c.pair.b)?;
                    Some(ScoringCandidate {
                        thought_a_id: c.pair.a.0,
                        thought_b_id: c.pair.b.0,
                        claim_a: a.claim.clone(),
                        claim_b: b.claim.clone(),
                        similarity: c.similarity,
                    })
                })
                .collect();

            match self.llm.score_pairs(&scoring_candidates).await {
                Ok(scores) => {
                    let to_promote = self.apply_scores(chunk, &scores)?;
                    summary.evaluated += chunk.len();
                    summary.migrated += self.store.move_to_thought_pairs(&to_promote)?;
                }
                Err(e) => {
                    warn!(error = %e, chunk_size = chunk.len(), "batch scoring call failed");
                    let now = Utc::now();
                    for candidate in chunk {
                        self.store.mark_candidate_failed(candidate.id, &e.to_string(), now)?;
                    }
                    summary.failed += chunk.len();
                }
            }

            tokio::time::sleep(INTER_CHUNK_PAUSE).await;
        }

        Ok(summary)
    }

    /// Applies one chunk's scores to the candidate rows, returning the ids
    /// that cleared the promotion threshold.
    fn apply_scores(
        &self,
        chunk: &[crate::model::PairCandidate],
        scores: &[crate::llm::PairScore],
    ) -> crate::error::SerendipityResult<Vec<CandidateId>> {
        let now = Utc::now();
        let mut to_promote = Vec::new();

        let by_pair: std::collections::HashMap<(i64, i64), &crate::llm::PairScore> = scores
            .iter()
            .map(|s| ((s.thought_a_id.min(s.thought_b_id), s.thought_a_id.max(s.thought_b_id)), s))
            .collect();

        for candidate in chunk {
            match by_pair.get(&(candidate.pair.a.0, candidate.pair.b.0)) {
                Some(score) => {
                    self.store.update_candidate_score(
                        candidate.id,
                        score.logical_expansion_score,
                        &score.connection_reason,
                        now,
                    )?;
                    if score.logical_expansion_score >= self.promotion_threshold {
                        to_promote.push(candidate.id);
                    }
                }
                None => {
                    self.store
                        .mark_candidate_failed(candidate.id, "no score returned for this pair", now)?;
                }
            }
        }

        Ok(to_promote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, PairScore};
    use crate::model::{PairKey, RawNote, ThoughtId};
    use std::collections::HashMap;

    async fn store_with_one_candidate() -> Arc<SqliteStore> {
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
        store
            .insert_thought_units(
                &note.id,
                &[
                    ("claim number one is long enough indeed".to_string(), None),
                    ("claim number two is also long enough yes".to_string(), None),
                ],
                Utc::now(),
            )
            .unwrap();
        store
            .insert_candidates(
                &[(PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap(), 0.2, note.id.clone(), note.id)],
                Utc::now(),
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn promotes_candidates_scoring_at_or_above_threshold() {
        let store = store_with_one_candidate().await;
        let llm = Arc::new(MockLlmClient::available().with_scores(vec![PairScore {
            thought_a_id: 1,
            thought_b_id: 2,
            logical_expansion_score: 90,
            connection_reason: "shared structural pattern".to_string(),
        }]));
        let worker = BatchEvaluationWorker::new(llm, store.clone());
        let summary = worker.run_once(None, None, 10).await.unwrap();
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.migrated, 1);

        let pair = store.get_pair(PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap()).unwrap();
        assert!(pair.is_some());
    }

    #[tokio::test]
    async fn marks_candidates_failed_on_llm_error() {
        let store = store_with_one_candidate().await;
        let llm = Arc::new(MockLlmClient::available().with_scores_failure(crate::llm::LlmError::RequestFailed("boom".to_string())));
        let worker = BatchEvaluationWorker::new(llm, store.clone());
        let summary = worker.run_once(None, None, 10).await.unwrap();
        assert_eq!(summary.failed, 1);

        let pending = store.list_pending_candidates(None, None, 10).unwrap();
        assert_eq!(pending[0].llm_attempts, 1);
    }
}
