//! End-to-end scenarios S1-S6 (spec §8), driven against the public
//! `serendipity::` API with mock note sources and an in-memory store.

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use serendipity::error::SerendipityError;
use serendipity::ingest::IngestPipeline;
use serendipity::mining::CandidateMiner;
use serendipity::model::{FetchMode, ImportJobConfig, JobStatus, PairKey, QualityTier, RawNote, ThoughtId};
use serendipity::notesource::{FetchedPage, MockNoteSource};
use serendipity::recommend::RecommendationEngine;
use serendipity::store::SqliteStore;

fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn page(id: &str, last_edited: chrono::DateTime<Utc>) -> FetchedPage {
    FetchedPage {
        id: id.to_string(),
        title: format!("note {id}"),
        content: "this body has plenty of characters in it".to_string(),
        properties: HashMap::new(),
        created_time: fixed_time(),
        last_edited_time: last_edited,
    }
}

fn default_config() -> ImportJobConfig {
    ImportJobConfig {
        fetch_mode: FetchMode::Database,
        page_size: 50,
        fetch_all: true,
    }
}

/// S1 - Two re-imports, no changes: expect `imported=0, skipped=3, status=completed`
/// and no soft-deletes on the second run.
#[tokio::test]
async fn s1_two_reimports_no_changes() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let source = Arc::new(
        MockNoteSource::new()
            .with_page(page("p1", fixed_time()))
            .with_page(page("p2", fixed_time()))
            .with_page(page("p3", fixed_time())),
    );
    let pipeline = IngestPipeline::new(source.clone(), store.clone());

    pipeline.run(uuid::Uuid::new_v4(), default_config()).await.unwrap();

    let second_job_id = uuid::Uuid::new_v4();
    pipeline.run(second_job_id, default_config()).await.unwrap();

    let job = store.get_import_job(second_job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.imported, 0);
    assert_eq!(job.skipped, 3);
    assert_eq!(store.list_active_raw_notes().unwrap().len(), 3);
}

/// S2 - One edit: re-importing with `p1`'s `last_edited` bumped forward
/// expects exactly one re-import and two skips.
#[tokio::test]
async fn s2_one_edit() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let source = Arc::new(
        MockNoteSource::new()
            .with_page(page("p1", fixed_time()))
            .with_page(page("p2", fixed_time()))
            .with_page(page("p3", fixed_time())),
    );
    let pipeline = IngestPipeline::new(source, store.clone());
    pipeline.run(uuid::Uuid::new_v4(), default_config()).await.unwrap();

    let edited_time = fixed_time() + chrono::Duration::hours(1);
    let source2 = Arc::new(
        MockNoteSource::new()
            .with_page(page("p1", edited_time))
            .with_page(page("p2", fixed_time()))
            .with_page(page("p3", fixed_time())),
    );
    let pipeline2 = IngestPipeline::new(source2, store.clone());
    let job_id = uuid::Uuid::new_v4();
    pipeline2.run(job_id, default_config()).await.unwrap();

    let job = store.get_import_job(job_id).unwrap().unwrap();
    assert_eq!(job.imported, 1);
    assert_eq!(job.skipped, 2);
}

/// S3 - Deletion: a page absent from a later listing is soft-deleted, and
/// any downstream essay referencing its thought units remains queryable.
#[tokio::test]
async fn s3_deletion_preserves_essays() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let source = Arc::new(
        MockNoteSource::new()
            .with_page(page("p1", fixed_time()))
            .with_page(page("p2", fixed_time()))
            .with_page(page("p3", fixed_time())),
    );
    let pipeline = IngestPipeline::new(source, store.clone());
    pipeline.run(uuid::Uuid::new_v4(), default_config()).await.unwrap();

    let thought_ids = store
        .insert_thought_units(
            &"p2".into(),
            &[("a claim long enough to pass validation checks".to_string(), None)],
            Utc::now(),
        )
        .unwrap();
    assert_eq!(thought_ids.len(), 1);

    let source2 = Arc::new(
        MockNoteSource::new()
            .with_page(page("p1", fixed_time()))
            .with_page(page("p3", fixed_time())),
    );
    let pipeline2 = IngestPipeline::new(source2, store.clone());
    pipeline2.run(uuid::Uuid::new_v4(), default_config()).await.unwrap();

    let note = store.get_raw_note(&"p2".into()).unwrap().unwrap();
    assert!(note.is_deleted);

    // Thought units derived from the now-deleted note are still readable.
    let thought = store.get_thought(thought_ids[0]).unwrap();
    assert!(thought.is_some());
}

/// S4 - Band too wide: a `[0.0, 0.9]` band exceeds the 0.8 max width and
/// raises `RangeMisconfiguration`, inserting nothing.
#[tokio::test]
async fn s4_band_too_wide_is_rejected() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let miner = CandidateMiner::new(store.clone());

    let err = miner.mine(0.0, 0.9).await.unwrap_err();
    assert!(matches!(err, SerendipityError::RangeMisconfiguration { .. }));
    assert_eq!(store.list_pending_candidates(None, None, 100).unwrap().len(), 0);
}

/// S5 - Quality tiers: scores `{65, 84, 85, 94, 95}` promote to
/// `{standard, standard, premium, premium, excellent}`.
#[tokio::test]
async fn s5_quality_tiers() {
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

    let scores = [65u8, 84, 85, 94, 95];
    let expected_tiers = [
        QualityTier::Standard,
        QualityTier::Standard,
        QualityTier::Premium,
        QualityTier::Premium,
        QualityTier::Excellent,
    ];

    let mut next_thought_id = 1i64;
    for (score, expected_tier) in scores.iter().zip(expected_tiers.iter()) {
        let a = ThoughtId(next_thought_id);
        let b = ThoughtId(next_thought_id + 1);
        next_thought_id += 2;
        let pair = PairKey::new(a, b).unwrap();

        let now = Utc::now();
        store
            .insert_candidates(&[(pair, 0.5, note.id.clone(), note.id.clone())], now)
            .unwrap();
        let pending = store
            .list_pending_candidates(None, None, 100)
            .unwrap()
            .into_iter()
            .find(|c| c.pair == pair)
            .unwrap();
        store.update_candidate_score(pending.id, *score, "reason", now).unwrap();
        store.move_to_thought_pairs(&[pending.id]).unwrap();

        let stored = store.get_pair(pair).unwrap().unwrap();
        assert_eq!(stored.quality_tier, *expected_tier);
    }
}

/// S6 - Recommender diversity: with `diversity_weight=1.0` and sources
/// repeating as `{A-B, A-C, A-D, E-F}`, `E-F` ranks first.
#[tokio::test]
async fn s6_recommender_diversity() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let note_ids = ["a", "b", "c", "d", "e", "f"];
    let mut thought_id_by_note = HashMap::new();
    for id in note_ids {
        let note = RawNote {
            id: id.into(),
            title: format!("note {id}"),
            content: Some("body text long enough".to_string()),
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
                &[(format!("a claim about {id} that is long enough"), None)],
                Utc::now(),
            )
            .unwrap();
        thought_id_by_note.insert(id, ids[0]);
    }

    let now = Utc::now();
    let pairs = [("a", "b"), ("a", "c"), ("a", "d"), ("e", "f")];
    for (left, right) in pairs {
        let left_id = thought_id_by_note[left];
        let right_id = thought_id_by_note[right];
        let pair = PairKey::new(left_id, right_id).unwrap();
        store
            .insert_candidates(&[(pair, 0.5, left.into(), right.into())], now)
            .unwrap();
        let pending = store
            .list_pending_candidates(None, None, 100)
            .unwrap()
            .into_iter()
            .find(|c| c.pair == pair)
            .unwrap();
        store.update_candidate_score(pending.id, 70, "reason", now).unwrap();
        store.move_to_thought_pairs(&[pending.id]).unwrap();
    }

    let engine = RecommendationEngine::new(store).with_diversity_weight(1.0);
    let recs = engine.recommend(4).await.unwrap();
    assert_eq!(recs.len(), 4);

    let top = &recs[0];
    let e_id = thought_id_by_note["e"];
    let f_id = thought_id_by_note["f"];
    assert_eq!(top.pair, PairKey::new(e_id, f_id).unwrap());
}
