//! Essay generation (C11): turns a curated pair into a short essay prompt
//! via the LLM, validates its shape, persists it, and best-effort marks the
//! source pair as used.
//!
//! Grounded on `mining.rs`'s store-then-best-effort-side-effect shape and
//! `thoughts.rs`'s "validate what the LLM hands back before persisting" flow.

use chrono::Utc;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::error::{SerendipityError, SerendipityResult};
use crate::llm::LlmClient;
use crate::model::{Essay, PairKey, UsedThought};
use crate::store::SqliteStore;

pub struct EssayGenerator {
    llm: Arc<dyn LlmClient>,
    store: Arc<SqliteStore>,
}

impl EssayGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<SqliteStore>) -> Self {
        Self { llm, store }
    }

    /// Generates and persists an essay for `pair` (spec §4.11). The
    /// `is_used_in_essay` flip happens after the essay is durably stored and
    /// is intentionally best-effort: a dropped flip just leaves the pair
    /// eligible for another essay later, which is tolerable; a missing essay
    /// row after a successful LLM call would not be.
    #[instrument(skip(self))]
    pub async fn generate(&self, pair: PairKey) -> SerendipityResult<Essay> {
        let stored_pair = self
            .store
            .get_pair(pair)?
            .ok_or_else(|| SerendipityError::NotFound(format!("no thought pair for {pair:?}")))?;

        let thoughts = self.store.get_thoughts(&[pair.a, pair.b])?;
        let thought_a = thoughts
            .get(&pair.a)
            .ok_or_else(|| SerendipityError::NotFound(format!("thought {:?} missing", pair.a)))?;
        let thought_b = thoughts
            .get(&pair.b)
            .ok_or_else(|| SerendipityError::NotFound(format!("thought {:?} missing", pair.b)))?;

        let generated = self
            .llm
            .generate_essay(&thought_a.claim, &thought_b.claim, &stored_pair.connection_reason)
            .await?;

        if !(Essay::TITLE_MIN_LEN..=Essay::TITLE_MAX_LEN).contains(&generated.title.len()) {
            return Err(SerendipityError::ValidationFailure(format!(
                "essay title length {} outside [{}, {}]",
                generated.title.len(),
                Essay::TITLE_MIN_LEN,
                Essay::TITLE_MAX_LEN
            )));
        }
        if generated.reason.len() > Essay::REASON_MAX_LEN {
            return Err(SerendipityError::ValidationFailure(format!(
                "essay reason length {} exceeds max {}",
                generated.reason.len(),
                Essay::REASON_MAX_LEN
            )));
        }
        let outline: [String; 3] = generated
            .outline
            .try_into()
            .map_err(|v: Vec<String>| SerendipityError::ValidationFailure(format!("essay outline must have exactly 3 items, got {}", v.len())))?;

        let used_thoughts = [
            self.used_thought_for(thought_a)?,
            self.used_thought_for(thought_b)?,
        ];

        let essay = Essay {
            id: crate::model::EssayId(0),
            title: generated.title,
            outline,
            used_thoughts,
            reason: generated.reason,
            pair,
            generated_at: Utc::now(),
        };

        let id = self.store.insert_essay(&essay)?;

        if let Err(e) = self.store.mark_pair_used_in_essay(pair) {
            warn!(error = %e, ?pair, "failed to flip is_used_in_essay after essay was persisted");
        }

        Ok(Essay { id, ..essay })
    }

    fn used_thought_for(&self, thought: &crate::model::ThoughtUnit) -> SerendipityResult<UsedThought> {
        let note = self
            .store
            .get_raw_note(&thought.raw_note_id)?
            .ok_or_else(|| SerendipityError::NotFound(format!("raw note {} missing", thought.raw_note_id)))?;
        Ok(UsedThought {
            claim: thought.claim.clone(),
            source_note_title: note.title,
            source_note_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GeneratedEssay, MockLlmClient};
    use crate::model::{RawNote, ThoughtId};
    use std::collections::HashMap;

    async fn store_with_pair() -> (Arc<SqliteStore>, PairKey) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let note = RawNote {
            id: "p1".into(),
            title: "A note about rivers".to_string(),
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
                    ("rivers carve valleys over geologic time".to_string(), None),
                    ("markets carve niches over economic time".to_string(), None),
                ],
                Utc::now(),
            )
            .unwrap();
        let now = Utc::now();
        store
            .insert_candidates(
                &[(PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap(), 0.4, note.id.clone(), note.id.clone())],
                now,
            )
            .unwrap();
        let pending = store.list_pending_candidates(None, None, 10).unwrap();
        store.update_candidate_score(pending[0].id, 90, "shared erosion metaphor".to_string().as_str(), now).unwrap();
        store.move_to_thought_pairs(&[pending[0].id]).unwrap();
        let pair = PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap();
        (store, pair)
    }

    #[tokio::test]
    async fn generates_persists_and_marks_pair_used() {
        let (store, pair) = store_with_pair().await;
        let llm = Arc::new(MockLlmClient::available().with_essay(GeneratedEssay {
            title: "Carving Paths".to_string(),
            outline: vec!["intro".to_string(), "body".to_string(), "close".to_string()],
            reason: "both describe slow structural carving".to_string(),
        }));
        let generator = EssayGenerator::new(llm, store.clone());
        let essay = generator.generate(pair).await.unwrap();
        assert_eq!(essay.title, "Carving Paths");

        let stored_pair = store.get_pair(pair).unwrap().unwrap();
        assert!(stored_pair.is_used_in_essay);
    }

    #[tokio::test]
    async fn rejects_an_outline_with_the_wrong_item_count() {
        let (store, pair) = store_with_pair().await;
        let llm = Arc::new(MockLlmClient::available().with_essay(GeneratedEssay {
            title: "Carving Paths".to_string(),
            outline: vec!["only one".to_string()],
            reason: "reason".to_string(),
        }));
        let generator = EssayGenerator::new(llm, store);
        let result = generator.generate(pair).await;
        assert!(matches!(result, Err(SerendipityError::ValidationFailure(_))));
    }
}
