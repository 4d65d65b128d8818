//! SQLite-backed store adapter (C2)
//!
//! One database file, one mutex-guarded connection (grounded on
//! `storage::sqlite::SqliteStore`). Every operation in spec §4.2 that the
//! original system exposed as a managed-Postgres stored procedure is
//! implemented here directly against SQLite — there is no separate RPC
//! layer to fall back from, so the documented fallback semantics for
//! `get_changed_pages` are simply the only code path, and must reproduce
//! the RPC's truth table exactly.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::model::{
    CandidateId, Essay, EssayId, FetchMode, ImportJob, ImportJobConfig, JobStatus, LlmStatus,
    MiningProgress, MiningStatus, PairCandidate, PairKey, Percentiles, PropertyValue, QualityTier,
    RawNote, RawNoteId, ThoughtId, ThoughtPair, ThoughtUnit, UsedThought,
};

use super::schema::init_schema;
use super::traits::{ChangedPages, PageStamp, StoreError, StoreResult};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // -----------------------------------------------------------------
    // RawNote (C2 / §4.5)
    // -----------------------------------------------------------------

    /// Upsert keyed on external id. Idempotent: re-running with the same
    /// external-last-edited-time is a no-op in effect (spec §8 invariant 3).
    pub fn upsert_raw_note(&self, note: &RawNote) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let properties_json = serde_json::to_string(&note.properties)?;
        conn.execute(
            "INSERT INTO raw_notes
                (id, title, content, properties_json, external_created_time,
                 external_last_edited_time, imported_time, is_deleted, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                properties_json = excluded.properties_json,
                external_last_edited_time = excluded.external_last_edited_time,
                imported_time = excluded.imported_time,
                is_deleted = 0,
                deleted_at = NULL",
            params![
                note.id.as_str(),
                note.title,
                note.content,
                properties_json,
                note.external_created_time.to_rfc3339(),
                note.external_last_edited_time.to_rfc3339(),
                note.imported_time.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Soft-delete: set `is_deleted = true`, `deleted_at = now`. Never hard-deletes.
    pub fn soft_delete_raw_note(&self, id: &RawNoteId, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE raw_notes SET is_deleted = 1, deleted_at = ?2 WHERE id = ?1",
            params![id.as_str(), now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_raw_note(&self, id: &RawNoteId) -> StoreResult<Option<RawNote>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, title, content, properties_json, external_created_time,
                        external_last_edited_time, imported_time, is_deleted, deleted_at
                 FROM raw_notes WHERE id = ?1",
                params![id.as_str()],
                Self::row_to_raw_note,
            )
            .optional()?;
        Ok(row)
    }

    /// Downstream read paths filter `is_deleted = false` (spec §4.5).
    pub fn list_active_raw_notes(&self) -> StoreResult<Vec<RawNote>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, content, properties_json, external_created_time,
                    external_last_edited_time, imported_time, is_deleted, deleted_at
             FROM raw_notes WHERE is_deleted = 0",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_raw_note)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_raw_note(row: &rusqlite::Row) -> rusqlite::Result<RawNote> {
        let properties_json: String = row.get(3)?;
        let properties: HashMap<String, PropertyValue> =
            serde_json::from_str(&properties_json).unwrap_or_default();
        let created: String = row.get(4)?;
        let edited: String = row.get(5)?;
        let imported: String = row.get(6)?;
        let deleted_at: Option<String> = row.get(8)?;
        Ok(RawNote {
            id: RawNoteId::new(row.get::<_, String>(0)?),
            title: row.get(1)?,
            content: row.get(2)?,
            properties,
            external_created_time: parse_rfc3339(&created),
            external_last_edited_time: parse_rfc3339(&edited),
            imported_time: parse_rfc3339(&imported),
            is_deleted: row.get::<_, i64>(7)? != 0,
            deleted_at: deleted_at.map(|s| parse_rfc3339(&s)),
        })
    }

    /// `get_changed_pages` (spec §4.2). `updated` iff external time is
    /// strictly greater than the stored time at second precision; `deleted`
    /// iff a non-deleted DB row's id is absent from `pages`.
    pub fn get_changed_pages(&self, pages: &[PageStamp]) -> StoreResult<ChangedPages> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, external_last_edited_time FROM raw_notes WHERE is_deleted = 0")?;
        let existing: HashMap<String, DateTime<Utc>> = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let edited: String = row.get(1)?;
                Ok((id, parse_rfc3339(&edited)))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        let incoming_ids: HashSet<&str> = pages.iter().map(|p| p.id.as_str()).collect();

        let mut new_ids = Vec::new();
        let mut updated_ids = Vec::new();
        let mut unchanged_count = 0usize;

        for page in pages {
            match existing.get(&page.id) {
                None => new_ids.push(page.id.clone()),
                Some(stored_time) => {
                    if truncate_to_secs(page.last_edited_time) > truncate_to_secs(*stored_time) {
                        updated_ids.push(page.id.clone());
                    } else {
                        unchanged_count += 1;
                    }
                }
            }
        }

        let deleted_ids: Vec<String> = existing
            .keys()
            .filter(|id| !incoming_ids.contains(id.as_str()))
            .cloned()
            .collect();

        Ok(ChangedPages {
            new_ids,
            updated_ids,
            deleted_ids,
            unchanged_count,
        })
    }

    // -----------------------------------------------------------------
    // ThoughtUnit (C6)
    // -----------------------------------------------------------------

    /// Insert all units for a note in one batched write (spec §4.6 step 4).
    pub fn insert_thought_units(
        &self,
        raw_note_id: &RawNoteId,
        units: &[(String, Option<String>)],
        extracted_time: DateTime<Utc>,
    ) -> StoreResult<Vec<ThoughtId>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(units.len());
        for (claim, context) in units {
            tx.execute(
                "INSERT INTO thought_units (raw_note_id, claim, context, extracted_time)
                 VALUES (?1, ?2, ?3, ?4)",
                params![raw_note_id.as_str(), claim, context, extracted_time.to_rfc3339()],
            )?;
            ids.push(ThoughtId(tx.last_insert_rowid()));
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn set_thought_embedding(
        &self,
        id: ThoughtId,
        embedding: &[f32],
        model: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_to_bytes(embedding);
        conn.execute(
            "UPDATE thought_units SET embedding = ?2, embedding_model = ?3 WHERE id = ?1",
            params![id.0, bytes, model],
        )?;
        Ok(())
    }

    pub fn get_thought(&self, id: ThoughtId) -> StoreResult<Option<ThoughtUnit>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, raw_note_id, claim, context, embedding, embedding_model, extracted_time
             FROM thought_units WHERE id = ?1",
            params![id.0],
            Self::row_to_thought,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn get_thoughts(&self, ids: &[ThoughtId]) -> StoreResult<HashMap<ThoughtId, ThoughtUnit>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT id, raw_note_id, claim, context, embedding, embedding_model, extracted_time
             FROM thought_units WHERE id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| &id.0 as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), Self::row_to_thought)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(|t| (t.id, t)).collect())
    }

    /// All active-note thoughts with an embedding, ordered by id — the
    /// universe for distance-table builds and mining.
    pub fn list_embedded_thought_ids(&self) -> StoreResult<Vec<ThoughtId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT tu.id FROM thought_units tu
             JOIN raw_notes rn ON rn.id = tu.raw_note_id
             WHERE tu.embedding IS NOT NULL AND rn.is_deleted = 0
             ORDER BY tu.id ASC",
        )?;
        let ids = stmt
            .query_map([], |row| Ok(ThoughtId(row.get(0)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Keyset page of embedded thought ids with `id > last_src_id`.
    pub fn list_embedded_thought_ids_after(
        &self,
        last_src_id: Option<ThoughtId>,
        limit: u32,
    ) -> StoreResult<Vec<ThoughtId>> {
        let conn = self.conn.lock().unwrap();
        let after = last_src_id.map(|t| t.0).unwrap_or(0);
        let mut stmt = conn.prepare(
            "SELECT tu.id FROM thought_units tu
             JOIN raw_notes rn ON rn.id = tu.raw_note_id
             WHERE tu.embedding IS NOT NULL AND rn.is_deleted = 0 AND tu.id > ?1
             ORDER BY tu.id ASC LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![after, limit], |row| Ok(ThoughtId(row.get(0)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn count_active_notes(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM raw_notes WHERE is_deleted = 0", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    fn row_to_thought(row: &rusqlite::Row) -> rusqlite::Result<ThoughtUnit> {
        let embedding: Option<Vec<u8>> = row.get(4)?;
        let extracted: String = row.get(6)?;
        Ok(ThoughtUnit {
            id: ThoughtId(row.get(0)?),
            raw_note_id: RawNoteId::new(row.get::<_, String>(1)?),
            claim: row.get(2)?,
            context: row.get(3)?,
            embedding: embedding.map(|b| bytes_to_f32_vec(&b)),
            embedding_model: row.get(5)?,
            extracted_time: parse_rfc3339(&extracted),
        })
    }

    // -----------------------------------------------------------------
    // ThoughtPairDistance (C7)
    // -----------------------------------------------------------------

    /// `build_distance_table_batch(offset, size)`: compute all pairs for one
    /// src slice against the full embedded universe, `ON CONFLICT DO NOTHING`.
    pub fn build_distance_table_batch(&self, offset: u32, size: u32) -> StoreResult<usize> {
        let universe = self.list_embedded_thought_ids()?;
        let slice: Vec<ThoughtId> = universe
            .iter()
            .skip(offset as usize)
            .take(size as usize)
            .copied()
            .collect();
        if slice.is_empty() {
            return Ok(0);
        }
        let embeddings = self.get_thoughts(&universe)?;
        self.insert_pairs_for_slice(&slice, &universe, &embeddings)
    }

    /// `update_distance_table_incremental(new_ids | NULL)`: insert `S x
    /// existing` and pairs within `S`, where `S` is auto-detected (ids with
    /// no distance row yet) when `new_ids` is `None`.
    pub fn update_distance_table_incremental(
        &self,
        new_ids: Option<&[ThoughtId]>,
    ) -> StoreResult<usize> {
        let universe = self.list_embedded_thought_ids()?;
        let new_set: HashSet<ThoughtId> = match new_ids {
            Some(ids) => ids.iter().copied().collect(),
            None => self.detect_unseen_thoughts(&universe)?,
        };
        if new_set.is_empty() {
            return Ok(0);
        }
        let new_vec: Vec<ThoughtId> = new_set.iter().copied().collect();
        let embeddings = self.get_thoughts(&universe)?;
        self.insert_pairs_for_slice(&new_vec, &universe, &embeddings)
    }

    fn detect_unseen_thoughts(&self, universe: &[ThoughtId]) -> StoreResult<HashSet<ThoughtId>> {
        let conn = self.conn.lock().unwrap();
        let mut seen: HashSet<ThoughtId> = HashSet::new();
        let mut stmt = conn.prepare("SELECT a_id FROM thought_pair_distances UNION SELECT b_id FROM thought_pair_distances")?;
        let rows = stmt.query_map([], |row| Ok(ThoughtId(row.get(0)?)))?;
        for r in rows {
            seen.insert(r?);
        }
        Ok(universe.iter().filter(|id| !seen.contains(id)).copied().collect())
    }

    fn insert_pairs_for_slice(
        &self,
        slice: &[ThoughtId],
        universe: &[ThoughtId],
        embeddings: &HashMap<ThoughtId, ThoughtUnit>,
    ) -> StoreResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        let slice_set: HashSet<ThoughtId> = slice.iter().copied().collect();
        for &src in slice {
            let Some(src_vec) = embeddings.get(&src).and_then(|t| t.embedding.as_deref()) else {
                continue;
            };
            for &dst in universe {
                if dst == src {
                    continue;
                }
                // Avoid double-inserting both (src,dst) and (dst,src) when
                // both happen to be in the same slice.
                if slice_set.contains(&dst) && dst < src {
                    continue;
                }
                let Some(pair) = PairKey::new(src, dst) else {
                    continue;
                };
                let Some(dst_vec) = embeddings.get(&dst).and_then(|t| t.embedding.as_deref()) else {
                    continue;
                };
                let sim = cosine_similarity(src_vec, dst_vec);
                let changed = tx.execute(
                    "INSERT INTO thought_pair_distances (a_id, b_id, similarity)
                     VALUES (?1, ?2, ?3) ON CONFLICT(a_id, b_id) DO NOTHING",
                    params![pair.a.0, pair.b.0, sim],
                )?;
                inserted += changed;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn count_distance_rows(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM thought_pair_distances", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Sample up to 10,000 rows and compute min/max/mean (spec §4.7 statistics).
    pub fn sample_distance_stats(&self) -> StoreResult<Option<(f32, f32, f64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT similarity FROM thought_pair_distances LIMIT 10000")?;
        let values: Vec<f32> = stmt
            .query_map([], |row| row.get::<_, f32>(0))?
            .collect::<Result<_, _>>()?;
        if values.is_empty() {
            return Ok(None);
        }
        let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mean = values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64;
        Ok(Some((min, max, mean)))
    }

    /// `calculate_distribution_from_distance_table()`: one-pass percentile
    /// sketch over the distance table.
    pub fn calculate_distribution_from_distance_table(&self) -> StoreResult<Option<(Percentiles, f64, f64, u64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT similarity FROM thought_pair_distances ORDER BY similarity ASC")?;
        let mut values: Vec<f32> = stmt
            .query_map([], |row| row.get::<_, f32>(0))?
            .collect::<Result<_, _>>()?;
        if values.is_empty() {
            return Ok(None);
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Ok(Some(percentiles_from_sorted(&values)))
    }

    /// `calculate_similarity_distribution()`: slow fallback computed
    /// directly over vectors rather than the cached distance table.
    pub fn calculate_similarity_distribution(&self) -> StoreResult<Option<(Percentiles, f64, f64, u64)>> {
        let universe = self.list_embedded_thought_ids()?;
        if universe.len() < 2 {
            return Ok(None);
        }
        let embeddings = self.get_thoughts(&universe)?;
        let mut values = Vec::new();
        for i in 0..universe.len() {
            let Some(a) = embeddings.get(&universe[i]).and_then(|t| t.embedding.as_deref()) else {
                continue;
            };
            for b_id in &universe[i + 1..] {
                let Some(b) = embeddings.get(b_id).and_then(|t| t.embedding.as_deref()) else {
                    continue;
                };
                values.push(cosine_similarity(a, b));
            }
        }
        if values.is_empty() {
            return Ok(None);
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Ok(Some(percentiles_from_sorted(&values)))
    }

    /// `find_similar_pairs_topk(min, max, k, limit)`: top-k nearest
    /// neighbors per vector within the similarity band, used when no
    /// distance table exists yet.
    pub fn find_similar_pairs_topk(
        &self,
        min_sim: f32,
        max_sim: f32,
        k: usize,
        limit: usize,
    ) -> StoreResult<Vec<(PairKey, f32)>> {
        let universe = self.list_embedded_thought_ids()?;
        let embeddings = self.get_thoughts(&universe)?;
        let mut results: Vec<(PairKey, f32)> = Vec::new();
        for (i, &src) in universe.iter().enumerate() {
            let Some(src_vec) = embeddings.get(&src).and_then(|t| t.embedding.as_deref()) else {
                continue;
            };
            let mut neighbors: Vec<(ThoughtId, f32)> = universe[i + 1..]
                .iter()
                .filter_map(|&dst| {
                    let dst_vec = embeddings.get(&dst)?.embedding.as_deref()?;
                    let sim = cosine_similarity(src_vec, dst_vec);
                    (sim >= min_sim && sim <= max_sim).then_some((dst, sim))
                })
                .collect();
            neighbors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            neighbors.truncate(k);
            for (dst, sim) in neighbors {
                if let Some(pair) = PairKey::new(src, dst) {
                    results.push((pair, sim));
                }
            }
            if results.len() >= limit {
                break;
            }
        }
        results.truncate(limit);
        Ok(results)
    }

    /// Keyset-paged scan of `thought_pair_distances` within a similarity
    /// band, ordered by `(a_id, b_id)` (spec §4.8 method A / candidate miner).
    pub fn list_distance_pairs_after(
        &self,
        min_sim: f32,
        max_sim: f32,
        after_a_id: Option<ThoughtId>,
        limit: u32,
    ) -> StoreResult<Vec<(PairKey, f32)>> {
        let conn = self.conn.lock().unwrap();
        let after = after_a_id.map(|t| t.0).unwrap_or(0);
        let mut stmt = conn.prepare(
            "SELECT a_id, b_id, similarity FROM thought_pair_distances
             WHERE similarity >= ?1 AND similarity <= ?2 AND a_id > ?3
             ORDER BY a_id ASC, b_id ASC LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(params![min_sim, max_sim, after, limit], |row| {
                let a: i64 = row.get(0)?;
                let b: i64 = row.get(1)?;
                let sim: f32 = row.get(2)?;
                Ok((a, b, sim))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(a, b, sim)| PairKey::new(ThoughtId(a), ThoughtId(b)).map(|p| (p, sim)))
            .collect())
    }

    // -----------------------------------------------------------------
    // DistributionCache (singleton row, id = 1)
    // -----------------------------------------------------------------

    pub fn save_distribution_cache(
        &self,
        percentiles: &Percentiles,
        mean: f64,
        stddev: f64,
        thought_count: u64,
        total_pairs: u64,
        calculated_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let percentiles_json = serde_json::to_string(&percentiles.values.to_vec())?;
        conn.execute(
            "INSERT INTO similarity_distribution_cache
                (id, percentiles_json, mean, stddev, thought_count, total_pairs, calculated_at, duration_ms)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                percentiles_json = excluded.percentiles_json,
                mean = excluded.mean,
                stddev = excluded.stddev,
                thought_count = excluded.thought_count,
                total_pairs = excluded.total_pairs,
                calculated_at = excluded.calculated_at,
                duration_ms = excluded.duration_ms",
            params![
                percentiles_json,
                mean,
                stddev,
                thought_count as i64,
                total_pairs as i64,
                calculated_at.to_rfc3339(),
                duration_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn load_distribution_cache(&self) -> StoreResult<Option<crate::model::DistributionCache>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT percentiles_json, mean, stddev, thought_count, total_pairs, calculated_at, duration_ms
             FROM similarity_distribution_cache WHERE id = 1",
            [],
            |row| {
                let percentiles_json: String = row.get(0)?;
                let calculated_at: String = row.get(5)?;
                Ok((percentiles_json, row.get::<_, f64>(1)?, row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?, row.get::<_, i64>(4)?, calculated_at, row.get::<_, i64>(6)?))
            },
        )
        .optional()?
        .map(|(pj, mean, stddev, thought_count, total_pairs, calculated_at, duration_ms)| {
            let values: Vec<f32> = serde_json::from_str(&pj)?;
            let mut arr = [0f32; 101];
            arr.copy_from_slice(&values[..101.min(values.len())]);
            Ok(crate::model::DistributionCache {
                percentiles: Percentiles { values: arr },
                mean,
                stddev,
                thought_count: thought_count as u64,
                total_pairs: total_pairs as u64,
                calculated_at: parse_rfc3339(&calculated_at),
                duration_ms: duration_ms as u64,
            })
        })
        .transpose()
        .map_err(StoreError::from)
    }

    // -----------------------------------------------------------------
    // PairCandidate (C8 / C9)
    // -----------------------------------------------------------------

    pub fn insert_candidates(
        &self,
        candidates: &[(PairKey, f32, RawNoteId, RawNoteId)],
        now: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        for (pair, sim, note_a, note_b) in candidates {
            let changed = tx.execute(
                "INSERT INTO pair_candidates
                    (a_id, b_id, similarity, raw_note_id_a, raw_note_id_b, llm_status, llm_attempts, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6)
                 ON CONFLICT(a_id, b_id) DO NOTHING",
                params![pair.a.0, pair.b.0, sim, note_a.as_str(), note_b.as_str(), now.to_rfc3339()],
            )?;
            inserted += changed;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Pending candidates within a similarity band, FIFO, filtered in-DB
    /// (spec §4.9 step 1).
    pub fn list_pending_candidates(
        &self,
        min_sim: Option<f32>,
        max_sim: Option<f32>,
        max_candidates: u32,
    ) -> StoreResult<Vec<PairCandidate>> {
        let conn = self.conn.lock().unwrap();
        let (min_sim, max_sim) = (min_sim.unwrap_or(0.0), max_sim.unwrap_or(1.0));
        let mut stmt = conn.prepare(
            "SELECT id, a_id, b_id, similarity, raw_note_id_a, raw_note_id_b,
                    llm_status, llm_attempts, llm_score, connection_reason,
                    created_at, last_evaluated_at, evaluation_error
             FROM pair_candidates
             WHERE llm_status = 'pending' AND llm_attempts < 3
               AND similarity >= ?1 AND similarity <= ?2
             ORDER BY created_at ASC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![min_sim, max_sim, max_candidates], Self::row_to_candidate)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<PairCandidate> {
        let created_at: String = row.get(10)?;
        let last_eval: Option<String> = row.get(11)?;
        let status: String = row.get(6)?;
        Ok(PairCandidate {
            id: CandidateId(row.get(0)?),
            pair: PairKey::new(ThoughtId(row.get(1)?), ThoughtId(row.get(2)?))
                .expect("stored pairs always have a != b"),
            similarity: row.get(3)?,
            raw_note_id_a: RawNoteId::new(row.get::<_, String>(4)?),
            raw_note_id_b: RawNoteId::new(row.get::<_, String>(5)?),
            llm_status: status.parse().unwrap_or(LlmStatus::Pending),
            llm_attempts: row.get::<_, i64>(7)? as u8,
            llm_score: row.get::<_, Option<i64>>(8)?.map(|v| v as u8),
            connection_reason: row.get(9)?,
            created_at: parse_rfc3339(&created_at),
            last_evaluated_at: last_eval.map(|s| parse_rfc3339(&s)),
            evaluation_error: row.get(12)?,
        })
    }

    /// `update_candidate_score`: marks `completed`, increments attempts,
    /// clears the error, stamps `last_evaluated_at`.
    pub fn update_candidate_score(
        &self,
        id: CandidateId,
        score: u8,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE pair_candidates
             SET llm_status = 'completed', llm_attempts = llm_attempts + 1,
                 llm_score = ?2, connection_reason = ?3, evaluation_error = NULL,
                 last_evaluated_at = ?4
             WHERE id = ?1",
            params![id.0, score as i64, reason, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Row-level update failure path: after 3 attempts, mark `failed`.
    pub fn mark_candidate_failed(
        &self,
        id: CandidateId,
        error: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE pair_candidates
             SET llm_attempts = llm_attempts + 1, evaluation_error = ?2, last_evaluated_at = ?3,
                 llm_status = CASE WHEN llm_attempts + 1 >= 3 THEN 'failed' ELSE llm_status END
             WHERE id = ?1",
            params![id.0, error, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// `move_to_thought_pairs(high_score_ids, min_score)`: reads the rows,
    /// computes `quality_tier`, upserts keyed on `(a_id, b_id)`.
    pub fn move_to_thought_pairs(&self, candidate_ids: &[CandidateId]) -> StoreResult<usize> {
        if candidate_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut migrated = 0usize;
        for id in candidate_ids {
            let row = tx
                .query_row(
                    "SELECT a_id, b_id, similarity, llm_score, connection_reason
                     FROM pair_candidates WHERE id = ?1 AND llm_score IS NOT NULL",
                    params![id.0],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, f32>(2)?,
                            row.get::<_, i64>(3)? as u8,
                            row.get::<_, Option<String>>(4)?,
                        ))
                    },
                )
                .optional()?;
            let Some((a_id, b_id, similarity, score, reason)) = row else {
                continue;
            };
            let Some(tier) = QualityTier::from_score(score) else {
                continue;
            };
            tx.execute(
                "INSERT INTO thought_pairs (a_id, b_id, similarity, claude_score, quality_tier, connection_reason, is_used_in_essay)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
                 ON CONFLICT(a_id, b_id) DO UPDATE SET
                    similarity = excluded.similarity,
                    claude_score = excluded.claude_score,
                    quality_tier = excluded.quality_tier,
                    connection_reason = excluded.connection_reason",
                params![a_id, b_id, similarity, score as i64, tier.as_str(), reason.unwrap_or_default()],
            )?;
            migrated += 1;
        }
        tx.commit()?;
        Ok(migrated)
    }

    // -----------------------------------------------------------------
    // ThoughtPair (C10 / C11)
    // -----------------------------------------------------------------

    /// One tier's unused, scored pairs ordered by `claude_score DESC`,
    /// fetching up to `limit` (spec §4.10 step 1).
    pub fn list_unused_pairs_by_tier(
        &self,
        tier: QualityTier,
        limit: u32,
    ) -> StoreResult<Vec<ThoughtPair>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a_id, b_id, similarity, claude_score, quality_tier, connection_reason, is_used_in_essay
             FROM thought_pairs
             WHERE is_used_in_essay = 0 AND claude_score IS NOT NULL AND quality_tier = ?1
             ORDER BY claude_score DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![tier.as_str(), limit], Self::row_to_pair)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn row_to_pair(row: &rusqlite::Row) -> rusqlite::Result<ThoughtPair> {
        let tier: String = row.get(4)?;
        Ok(ThoughtPair {
            pair: PairKey::new(ThoughtId(row.get(0)?), ThoughtId(row.get(1)?))
                .expect("stored pairs always have a != b"),
            similarity: row.get(2)?,
            claude_score: row.get::<_, i64>(3)? as u8,
            quality_tier: tier.parse().unwrap_or(QualityTier::Standard),
            connection_reason: row.get(5)?,
            is_used_in_essay: row.get::<_, i64>(6)? != 0,
        })
    }

    pub fn get_pair(&self, pair: PairKey) -> StoreResult<Option<ThoughtPair>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT a_id, b_id, similarity, claude_score, quality_tier, connection_reason, is_used_in_essay
             FROM thought_pairs WHERE a_id = ?1 AND b_id = ?2",
            params![pair.a.0, pair.b.0],
            Self::row_to_pair,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Flip `is_used_in_essay = true`. Idempotent: a duplicate call is a no-op.
    pub fn mark_pair_used_in_essay(&self, pair: PairKey) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE thought_pairs SET is_used_in_essay = 1 WHERE a_id = ?1 AND b_id = ?2",
            params![pair.a.0, pair.b.0],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Essay (C11)
    // -----------------------------------------------------------------

    pub fn insert_essay(&self, essay: &Essay) -> StoreResult<EssayId> {
        let conn = self.conn.lock().unwrap();
        let outline_json = serde_json::to_string(&essay.outline)?;
        let used_thoughts_json = serde_json::to_string(&essay.used_thoughts)?;
        conn.execute(
            "INSERT INTO essays (title, outline_json, used_thoughts_json, reason, pair_a_id, pair_b_id, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                essay.title,
                outline_json,
                used_thoughts_json,
                essay.reason,
                essay.pair.a.0,
                essay.pair.b.0,
                essay.generated_at.to_rfc3339(),
            ],
        )?;
        Ok(EssayId(conn.last_insert_rowid()))
    }

    pub fn list_essays(&self, limit: u32, offset: u32) -> StoreResult<Vec<Essay>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, outline_json, used_thoughts_json, reason, pair_a_id, pair_b_id, generated_at
             FROM essays ORDER BY generated_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit, offset], |row| {
                let outline_json: String = row.get(2)?;
                let used_thoughts_json: String = row.get(3)?;
                let generated_at: String = row.get(7)?;
                let outline: Vec<String> = serde_json::from_str(&outline_json).unwrap_or_default();
                let used_thoughts: Vec<UsedThought> =
                    serde_json::from_str(&used_thoughts_json).unwrap_or_default();
                Ok(Essay {
                    id: EssayId(row.get(0)?),
                    title: row.get(1)?,
                    outline: outline.try_into().unwrap_or_else(|v: Vec<String>| {
                        [v.first().cloned().unwrap_or_default(), String::new(), String::new()]
                    }),
                    used_thoughts: used_thoughts.try_into().unwrap_or_else(|_| {
                        [
                            UsedThought {
                                claim: String::new(),
                                source_note_title: String::new(),
                                source_note_url: None,
                            },
                            UsedThought {
                                claim: String::new(),
                                source_note_title: String::new(),
                                source_note_url: None,
                            },
                        ]
                    }),
                    reason: row.get(4)?,
                    pair: PairKey::new(ThoughtId(row.get(5)?), ThoughtId(row.get(6)?))
                        .expect("stored pairs always have a != b"),
                    generated_at: parse_rfc3339(&generated_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -----------------------------------------------------------------
    // ImportJob (C5)
    // -----------------------------------------------------------------

    pub fn create_import_job(&self, job: &ImportJob) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let config_json = serde_json::to_string(&job.config)?;
        let failed_pages_json = serde_json::to_string(&job.failed_pages)?;
        conn.execute(
            "INSERT INTO import_jobs (id, status, total_pages, processed, imported, skipped,
                                       failed_pages_json, started_at, finished_at, config_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                job.id.to_string(),
                job.status.to_string(),
                job.total_pages,
                job.processed,
                job.imported,
                job.skipped,
                failed_pages_json,
                job.started_at.to_rfc3339(),
                job.finished_at.map(|t| t.to_rfc3339()),
                config_json,
            ],
        )?;
        Ok(())
    }

    pub fn update_import_job(&self, job: &ImportJob) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let failed_pages_json = serde_json::to_string(&job.failed_pages)?;
        conn.execute(
            "UPDATE import_jobs SET status = ?2, total_pages = ?3, processed = ?4, imported = ?5,
                                     skipped = ?6, failed_pages_json = ?7, finished_at = ?8
             WHERE id = ?1",
            params![
                job.id.to_string(),
                job.status.to_string(),
                job.total_pages,
                job.processed,
                job.imported,
                job.skipped,
                failed_pages_json,
                job.finished_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// `increment_job_progress`: never raises. Failures are logged by the
    /// caller and swallowed — this method itself only returns a `StoreResult`
    /// so callers can choose to log; it performs no panics.
    pub fn increment_job_progress(
        &self,
        id: uuid::Uuid,
        imported_delta: u32,
        skipped_delta: u32,
        failed_page: Option<&str>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let current_failed: String = conn.query_row(
            "SELECT failed_pages_json FROM import_jobs WHERE id = ?1",
            params![id.to_string()],
            |r| r.get(0),
        )?;
        let mut failed: Vec<String> = serde_json::from_str(&current_failed)?;
        if let Some(page) = failed_page {
            failed.push(page.to_string());
        }
        let failed_json = serde_json::to_string(&failed)?;
        conn.execute(
            "UPDATE import_jobs SET processed = processed + 1, imported = imported + ?2,
                                     skipped = skipped + ?3, failed_pages_json = ?4
             WHERE id = ?1",
            params![id.to_string(), imported_delta, skipped_delta, failed_json],
        )?;
        Ok(())
    }

    pub fn get_import_job(&self, id: uuid::Uuid) -> StoreResult<Option<ImportJob>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, status, total_pages, processed, imported, skipped,
                    failed_pages_json, started_at, finished_at, config_json
             FROM import_jobs WHERE id = ?1",
            params![id.to_string()],
            Self::row_to_job,
        )
        .optional()
        .map_err(StoreError::from)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ImportJob> {
        let status: String = row.get(1)?;
        let failed_pages_json: String = row.get(6)?;
        let started_at: String = row.get(7)?;
        let finished_at: Option<String> = row.get(8)?;
        let config_json: String = row.get(9)?;
        Ok(ImportJob {
            id: uuid::Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
            status: match status.as_str() {
                "pending" => JobStatus::Pending,
                "processing" => JobStatus::Processing,
                "completed" => JobStatus::Completed,
                _ => JobStatus::Failed,
            },
            total_pages: row.get(2)?,
            processed: row.get(3)?,
            imported: row.get(4)?,
            skipped: row.get(5)?,
            failed_pages: serde_json::from_str(&failed_pages_json).unwrap_or_default(),
            started_at: parse_rfc3339(&started_at),
            finished_at: finished_at.map(|s| parse_rfc3339(&s)),
            config: serde_json::from_str(&config_json).unwrap_or(ImportJobConfig {
                fetch_mode: FetchMode::Database,
                page_size: 100,
                fetch_all: true,
            }),
        })
    }

    // -----------------------------------------------------------------
    // MiningProgress (C8)
    // -----------------------------------------------------------------

    pub fn save_mining_progress(&self, progress: &MiningProgress) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let status = match progress.status {
            MiningStatus::Running => "running",
            MiningStatus::Completed => "completed",
            MiningStatus::Failed => "failed",
        };
        conn.execute(
            "INSERT INTO pair_mining_progress
                (id, last_src_id, total_mined, src_batch, dst_sample, k, p_lo, p_hi, seed, status, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                last_src_id = excluded.last_src_id,
                total_mined = excluded.total_mined,
                src_batch = excluded.src_batch,
                dst_sample = excluded.dst_sample,
                k = excluded.k,
                p_lo = excluded.p_lo,
                p_hi = excluded.p_hi,
                seed = excluded.seed,
                status = excluded.status,
                updated_at = excluded.updated_at",
            params![
                progress.last_src_id.map(|t| t.0),
                progress.total_mined as i64,
                progress.src_batch,
                progress.dst_sample,
                progress.k,
                progress.p_lo,
                progress.p_hi,
                progress.seed as i64,
                status,
                progress.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load_mining_progress(&self) -> StoreResult<Option<MiningProgress>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT last_src_id, total_mined, src_batch, dst_sample, k, p_lo, p_hi, seed, status, updated_at
             FROM pair_mining_progress WHERE id = 1",
            [],
            |row| {
                let status: String = row.get(8)?;
                let updated_at: String = row.get(9)?;
                Ok(MiningProgress {
                    last_src_id: row.get::<_, Option<i64>>(0)?.map(ThoughtId),
                    total_mined: row.get::<_, i64>(1)? as u64,
                    src_batch: row.get(2)?,
                    dst_sample: row.get(3)?,
                    k: row.get(4)?,
                    p_lo: row.get(5)?,
                    p_hi: row.get(6)?,
                    seed: row.get::<_, i64>(7)? as u64,
                    status: match status.as_str() {
                        "completed" => MiningStatus::Completed,
                        "failed" => MiningStatus::Failed,
                        _ => MiningStatus::Running,
                    },
                    updated_at: parse_rfc3339(&updated_at),
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn truncate_to_secs(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn f32_slice_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_f32_vec(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity between two vectors (teacher: `adapter::embedding::cosine_similarity`).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

fn percentiles_from_sorted(sorted: &[f32]) -> (Percentiles, f64, f64, u64) {
    let n = sorted.len();
    let mut values = [0f32; 101];
    for (p, slot) in values.iter_mut().enumerate() {
        let idx = ((p as f64 / 100.0) * (n - 1) as f64).round() as usize;
        *slot = sorted[idx.min(n - 1)];
    }
    let mean = sorted.iter().map(|v| *v as f64).sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n as f64;
    (Percentiles { values }, mean, variance.sqrt(), n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note(id: &str, edited: DateTime<Utc>) -> RawNote {
        RawNote {
            id: RawNoteId::new(id),
            title: format!("note {id}"),
            content: Some("some body text".to_string()),
            properties: HashMap::new(),
            external_created_time: edited,
            external_last_edited_time: edited,
            imported_time: Utc::now(),
            is_deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t = Utc::now();
        store.upsert_raw_note(&sample_note("p1", t)).unwrap();
        store.upsert_raw_note(&sample_note("p1", t)).unwrap();
        assert_eq!(store.list_active_raw_notes().unwrap().len(), 1);
    }

    #[test]
    fn get_changed_pages_matches_truth_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base_time = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store.upsert_raw_note(&sample_note("p1", base_time)).unwrap();
        store.upsert_raw_note(&sample_note("p2", base_time)).unwrap();
        store.upsert_raw_note(&sample_note("p3", base_time)).unwrap();

        // S2: p1 edited an hour later, p2/p3 unchanged, none deleted.
        let edited = base_time + chrono::Duration::hours(1);
        let pages = vec![
            PageStamp { id: "p1".to_string(), last_edited_time: edited },
            PageStamp { id: "p2".to_string(), last_edited_time: base_time },
            PageStamp { id: "p3".to_string(), last_edited_time: base_time },
        ];
        let changed = store.get_changed_pages(&pages).unwrap();
        assert_eq!(changed.updated_ids, vec!["p1".to_string()]);
        assert_eq!(changed.unchanged_count, 2);
        assert!(changed.new_ids.is_empty());
        assert!(changed.deleted_ids.is_empty());
    }

    #[test]
    fn get_changed_pages_detects_deletion() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t = Utc::now();
        store.upsert_raw_note(&sample_note("p1", t)).unwrap();
        store.upsert_raw_note(&sample_note("p2", t)).unwrap();
        store.upsert_raw_note(&sample_note("p3", t)).unwrap();

        let pages = vec![
            PageStamp { id: "p1".to_string(), last_edited_time: t },
            PageStamp { id: "p3".to_string(), last_edited_time: t },
        ];
        let changed = store.get_changed_pages(&pages).unwrap();
        assert_eq!(changed.deleted_ids, vec!["p2".to_string()]);
    }

    #[test]
    fn distance_rows_respect_ordering_and_range_invariant() {
        let store = SqliteStore::open_in_memory().unwrap();
        let note = sample_note("p1", Utc::now());
        store.upsert_raw_note(&note).unwrap();
        let ids = store
            .insert_thought_units(
                &note.id,
                &[
                    ("claim number one is long enough".to_string(), None),
                    ("claim number two is also long enough".to_string(), None),
                    ("claim number three is long enough too".to_string(), None),
                ],
                Utc::now(),
            )
            .unwrap();
        store.set_thought_embedding(ids[0], &[1.0, 0.0, 0.0], "test").unwrap();
        store.set_thought_embedding(ids[1], &[0.9, 0.1, 0.0], "test").unwrap();
        store.set_thought_embedding(ids[2], &[0.0, 1.0, 0.0], "test").unwrap();

        store.build_distance_table_batch(0, 10).unwrap();
        assert_eq!(store.count_distance_rows().unwrap(), 3);
    }

    #[test]
    fn build_is_resumable_via_on_conflict_do_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let note = sample_note("p1", Utc::now());
        store.upsert_raw_note(&note).unwrap();
        let ids = store
            .insert_thought_units(
                &note.id,
                &[
                    ("claim number one is long enough".to_string(), None),
                    ("claim number two is also long enough".to_string(), None),
                ],
                Utc::now(),
            )
            .unwrap();
        store.set_thought_embedding(ids[0], &[1.0, 0.0], "test").unwrap();
        store.set_thought_embedding(ids[1], &[0.0, 1.0], "test").unwrap();

        store.build_distance_table_batch(0, 1).unwrap();
        let first_count = store.count_distance_rows().unwrap();
        store.build_distance_table_batch(0, 10).unwrap();
        let second_count = store.count_distance_rows().unwrap();
        assert_eq!(second_count, 1);
        assert_eq!(first_count, second_count);
    }

    #[test]
    fn move_to_thought_pairs_assigns_tiers() {
        let store = SqliteStore::open_in_memory().unwrap();
        let note = sample_note("p1", Utc::now());
        store.upsert_raw_note(&note).unwrap();
        let now = Utc::now();
        store
            .insert_candidates(
                &[(
                    PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap(),
                    0.5,
                    note.id.clone(),
                    note.id.clone(),
                )],
                now,
            )
            .unwrap();
        let pending = store.list_pending_candidates(None, None, 10).unwrap();
        assert_eq!(pending.len(), 1);
        store.update_candidate_score(pending[0].id, 90, "reason", now).unwrap();
        let migrated = store.move_to_thought_pairs(&[pending[0].id]).unwrap();
        assert_eq!(migrated, 1);
        let pair = store
            .get_pair(PairKey::new(ThoughtId(1), ThoughtId(2)).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(pair.quality_tier, QualityTier::Premium);
    }
}
