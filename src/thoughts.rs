//! Thought extractor (C6): turns each active note's content into atomic
//! claims via the LLM, embeds them, and persists both in one pass.
//!
//! Grounded on `adapter::ingest::IngestPipeline`'s batching shape (process a
//! slice, persist, move on) but driven by `LlmClient::extract_thoughts` +
//! `Embedder::embed_batch` instead of graph emission.

use std::sync::Arc;
use tracing::{instrument, warn};

use crate::embedding::Embedder;
use crate::llm::LlmClient;
use crate::model::{RawNote, ThoughtId, ThoughtUnit};
use crate::store::SqliteStore;

/// New thought units trigger an incremental distance-table update once this
/// many have accumulated since the last update (spec §4.6 step 6).
const AUTO_UPDATE_THRESHOLD: usize = 10;

pub struct ThoughtExtractor {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
    store: Arc<SqliteStore>,
}

impl ThoughtExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, embedder: Arc<dyn Embedder>, store: Arc<SqliteStore>) -> Self {
        Self { llm, embedder, store }
    }

    /// Extracts and embeds thought units for every active note that has
    /// none yet, then incrementally updates the distance table if enough
    /// new units accumulated.
    #[instrument(skip(self))]
    pub async fn process_pending_notes(&self) -> crate::error::SerendipityResult<usize> {
        let notes = self.store.list_active_raw_notes()?;
        let mut new_ids = Vec::new();

        for note in notes {
            let Some(content) = note.content.as_deref() else {
                continue;
            };
            match self.extract_and_embed(&note, content).await {
                Ok(ids) => new_ids.extend(ids),
                Err(e) => warn!(note_id = %note.id, error = %e, "failed to extract thoughts for note"),
            }
        }

        if new_ids.len() >= AUTO_UPDATE_THRESHOLD {
            self.store.update_distance_table_incremental(Some(&new_ids))?;
        }

        Ok(new_ids.len())
    }

    /// Extracts, validates, embeds, and persists thought units for a single
    /// note (spec §4.6 steps 2-5). Claims failing shape validation are
    /// dropped rather than aborting the whole note's extraction.
    async fn extract_and_embed(&self, note: &RawNote, content: &str) -> crate::error::SerendipityResult<Vec<ThoughtId>> {
        let extracted = self.llm.extract_thoughts(&note.title, content).await?;

        let valid: Vec<(String, Option<String>)> = extracted
            .into_iter()
            .filter(|t| ThoughtUnit::validate_shape(&t.claim, t.context.as_deref()).is_ok())
            .map(|t| (t.claim, t.context))
            .collect();

        if valid.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self
            .store
            .insert_thought_units(&note.id, &valid, chrono::Utc::now())?;

        let claims: Vec<&str> = valid.iter().map(|(claim, _)| claim.as_str()).collect();
        let vectors = self.embedder.embed_batch(&claims).map_err(|e| {
            crate::error::SerendipityError::TransientNetwork(e.to_string())
        })?;

        for (id, vector) in ids.iter().zip(vectors.iter()) {
            self.store.set_thought_embedding(*id, vector, self.embedder.model_name())?;
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::llm::{ExtractedThought, MockLlmClient};
    use chrono::Utc;
    use std::collections::HashMap;

    #[tokio::test]
    async fn extracts_embeds_and_persists_thought_units() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let note = RawNote {
            id: "p1".into(),
            title: "A Note".to_string(),
            content: Some("body text long enough to extract from".to_string()),
            properties: HashMap::new(),
            external_created_time: Utc::now(),
            external_last_edited_time: Utc::now(),
            imported_time: Utc::now(),
            is_deleted: false,
            deleted_at: None,
        };
        store.upsert_raw_note(&note).unwrap();

        let llm = Arc::new(MockLlmClient::available().with_thoughts(vec![
            ExtractedThought {
                claim: "a sufficiently long claim about something".to_string(),
                context: None,
            },
            ExtractedThought {
                claim: "short".to_string(),
                context: None,
            },
        ]));
        let embedder = Arc::new(MockEmbedder::default());
        let extractor = ThoughtExtractor::new(llm, embedder, store.clone());

        let count = extractor.process_pending_notes().await.unwrap();
        assert_eq!(count, 1);

        let universe = store.list_embedded_thought_ids().unwrap();
        assert_eq!(universe.len(), 1);
    }

    #[tokio::test]
    async fn triggers_incremental_distance_update_at_threshold() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut thoughts = Vec::new();
        for i in 0..11 {
            thoughts.push(ExtractedThought {
                claim: format!("claim number {i} is long enough to pass validation checks"),
                context: None,
            });
        }
        // One note, eleven claims in a single extraction batch.
        let note = RawNote {
            id: "p1".into(),
            title: "A Note".to_string(),
            content: Some("body text long enough to extract from".to_string()),
            properties: HashMap::new(),
            external_created_time: Utc::now(),
            external_last_edited_time: Utc::now(),
            imported_time: Utc::now(),
            is_deleted: false,
            deleted_at: None,
        };
        store.upsert_raw_note(&note).unwrap();

        let llm = Arc::new(MockLlmClient::available().with_thoughts(thoughts));
        let embedder = Arc::new(MockEmbedder::default());
        let extractor = ThoughtExtractor::new(llm, embedder, store.clone());

        extractor.process_pending_notes().await.unwrap();
        assert!(store.count_distance_rows().unwrap() > 0);
    }
}
