//! Ingest pipeline (C5): pull page summaries, diff against the store,
//! fetch/upsert the delta, soft-delete what disappeared upstream.
//!
//! Grounded on `adapter::ingest::IngestPipeline`: a single write endpoint
//! driving an async `run` that progressively accumulates a result, except
//! this pipeline emits `RawNote` upserts instead of graph node/edge
//! mutations.

use chrono::Utc;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::model::{ImportJob, ImportJobConfig, JobStatus, RawNote};
use crate::notesource::NoteSource;
use crate::store::{PageStamp, SqliteStore};

/// Runs one full ingest cycle: list -> diff -> fetch -> upsert -> soft-delete,
/// tracking progress on an `ImportJob` row throughout (spec §4.5 steps 1-7).
pub struct IngestPipeline {
    note_source: Arc<dyn NoteSource>,
    store: Arc<SqliteStore>,
}

impl IngestPipeline {
    pub fn new(note_source: Arc<dyn NoteSource>, store: Arc<SqliteStore>) -> Self {
        Self { note_source, store }
    }

    /// Runs the ingest job to completion, updating the job row as it goes.
    /// A note-source failure on an individual page is recorded against the
    /// job (`increment_job_progress`'s `failed_page`) and does not abort the
    /// run; a store failure on job bookkeeping itself is logged and
    /// swallowed — never an error, per spec §7's `ProgressTrackingFailure`.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: uuid::Uuid, config: ImportJobConfig) -> crate::error::SerendipityResult<()> {
        let mut job = ImportJob::new(job_id, config.clone());
        job.status = JobStatus::Processing;
        self.store.create_import_job(&job)?;

        let summaries = self.collect_all_summaries(config.page_size).await?;
        job.total_pages = summaries.len() as u32;
        self.store.update_import_job(&job)?;

        let stamps: Vec<PageStamp> = summaries
            .iter()
            .map(|s| PageStamp {
                id: s.id.clone(),
                last_edited_time: s.last_edited_time,
            })
            .collect();
        let changed = self.store.get_changed_pages(&stamps)?;

        let mut to_fetch = changed.new_ids;
        to_fetch.extend(changed.updated_ids);

        for page_id in &to_fetch {
            match self.note_source.fetch_page(page_id).await {
                Ok(page) => {
                    let content = (page.content.trim().chars().count() >= 10).then(|| page.content.clone());
                    let note = RawNote {
                        id: page.id.clone().into(),
                        title: page.title,
                        content,
                        properties: page.properties,
                        external_created_time: page.created_time,
                        external_last_edited_time: page.last_edited_time,
                        imported_time: Utc::now(),
                        is_deleted: false,
                        deleted_at: None,
                    };
                    if let Err(e) = self.store.upsert_raw_note(&note) {
                        warn!(page_id, error = %e, "failed to persist fetched page");
                        self.bump_progress(job_id, 0, 0, Some(page_id));
                        continue;
                    }
                    self.bump_progress(job_id, 1, 0, None);
                }
                Err(e) => {
                    warn!(page_id, error = %e, "failed to fetch page, skipping");
                    self.bump_progress(job_id, 0, 1, Some(page_id));
                }
            }
        }

        let now = Utc::now();
        for id in &changed.deleted_ids {
            if let Err(e) = self.store.soft_delete_raw_note(&id.clone().into(), now) {
                warn!(id, error = %e, "failed to soft-delete page absent from upstream listing");
            }
        }

        job.status = JobStatus::Completed;
        job.finished_at = Some(Utc::now());
        if let Some(reloaded) = self.store.get_import_job(job_id)? {
            job.processed = reloaded.processed;
            job.imported = reloaded.imported;
            job.skipped = reloaded.skipped;
            job.failed_pages = reloaded.failed_pages;
        }
        self.store.update_import_job(&job)?;
        Ok(())
    }

    async fn collect_all_summaries(&self, page_size: u32) -> crate::error::SerendipityResult<Vec<crate::notesource::PageSummary>> {
        let mut all = Vec::new();
        let mut cursor = None;
        loop {
            let (batch, next) = self.note_source.list_page_summaries(page_size, cursor).await?;
            all.extend(batch);
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(all)
    }

    /// `increment_job_progress`: never surfaces an error to the caller. A
    /// failure here is logged and dropped, matching spec §7's
    /// `ProgressTrackingFailure` — a missed counter update is tolerable, an
    /// aborted ingest run is not.
    fn bump_progress(&self, job_id: uuid::Uuid, imported_delta: u32, skipped_delta: u32, failed_page: Option<&str>) {
        if let Err(e) = self.store.increment_job_progress(job_id, imported_delta, skipped_delta, failed_page) {
            warn!(job_id = %job_id, error = %e, "failed to record ingest job progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notesource::MockNoteSource;
    use chrono::Utc;
    use std::collections::HashMap;

    fn page(id: &str) -> crate::notesource::FetchedPage {
        crate::notesource::FetchedPage {
            id: id.to_string(),
            title: format!("note {id}"),
            content: "this body has plenty of characters in it".to_string(),
            properties: HashMap::new(),
            created_time: Utc::now(),
            last_edited_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn run_imports_new_pages_and_completes_job() {
        let source = Arc::new(
            MockNoteSource::new()
                .with_page(page("p1"))
                .with_page(page("p2")),
        );
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let pipeline = IngestPipeline::new(source, store.clone());

        let job_id = uuid::Uuid::new_v4();
        let config = ImportJobConfig {
            fetch_mode: crate::model::FetchMode::Database,
            page_size: 50,
            fetch_all: true,
        };
        pipeline.run(job_id, config).await.unwrap();

        let notes = store.list_active_raw_notes().unwrap();
        assert_eq!(notes.len(), 2);
        let job = store.get_import_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.imported, 2);
        assert!(job.is_consistent_at_terminal());
    }

    #[tokio::test]
    async fn run_soft_deletes_pages_absent_from_listing() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .upsert_raw_note(&RawNote {
                id: "gone".into(),
                title: "stale".to_string(),
                content: Some("old content here that is long enough".to_string()),
                properties: HashMap::new(),
                external_created_time: Utc::now(),
                external_last_edited_time: Utc::now(),
                imported_time: Utc::now(),
                is_deleted: false,
                deleted_at: None,
            })
            .unwrap();

        let source = Arc::new(MockNoteSource::new());
        let pipeline = IngestPipeline::new(source, store.clone());
        let config = ImportJobConfig {
            fetch_mode: crate::model::FetchMode::Database,
            page_size: 50,
            fetch_all: true,
        };
        pipeline.run(uuid::Uuid::new_v4(), config).await.unwrap();

        let note = store.get_raw_note(&"gone".into()).unwrap().unwrap();
        assert!(note.is_deleted);
    }
}
