//! SQLite DDL for the pipeline's persisted schema (spec §6.2)
//!
//! Batched `CREATE TABLE IF NOT EXISTS` + index statements, following the
//! teacher's `SqliteStore::init_schema` structure: one `execute_batch` call
//! per logical group of tables.

use rusqlite::Connection;

use super::traits::StoreResult;

pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;

        CREATE TABLE IF NOT EXISTS raw_notes (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT,
            properties_json TEXT NOT NULL,
            external_created_time TEXT NOT NULL,
            external_last_edited_time TEXT NOT NULL,
            imported_time TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_raw_notes_deleted ON raw_notes(is_deleted);

        CREATE TABLE IF NOT EXISTS thought_units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_note_id TEXT NOT NULL REFERENCES raw_notes(id),
            claim TEXT NOT NULL,
            context TEXT,
            embedding BLOB,
            embedding_model TEXT,
            extracted_time TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_thought_units_note ON thought_units(raw_note_id);

        CREATE TABLE IF NOT EXISTS thought_pair_distances (
            a_id INTEGER NOT NULL,
            b_id INTEGER NOT NULL,
            similarity REAL NOT NULL CHECK (similarity >= 0.0 AND similarity <= 1.0),
            PRIMARY KEY (a_id, b_id),
            CHECK (a_id < b_id)
        );
        CREATE INDEX IF NOT EXISTS idx_distances_similarity ON thought_pair_distances(similarity);
        CREATE INDEX IF NOT EXISTS idx_distances_a ON thought_pair_distances(a_id);

        CREATE TABLE IF NOT EXISTS pair_candidates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            a_id INTEGER NOT NULL,
            b_id INTEGER NOT NULL,
            similarity REAL NOT NULL,
            raw_note_id_a TEXT NOT NULL,
            raw_note_id_b TEXT NOT NULL,
            llm_status TEXT NOT NULL DEFAULT 'pending',
            llm_attempts INTEGER NOT NULL DEFAULT 0,
            llm_score INTEGER,
            connection_reason TEXT,
            created_at TEXT NOT NULL,
            last_evaluated_at TEXT,
            evaluation_error TEXT,
            UNIQUE (a_id, b_id),
            CHECK (a_id < b_id)
        );
        CREATE INDEX IF NOT EXISTS idx_candidates_status ON pair_candidates(llm_status, llm_attempts, created_at);

        CREATE TABLE IF NOT EXISTS thought_pairs (
            a_id INTEGER NOT NULL,
            b_id INTEGER NOT NULL,
            similarity REAL NOT NULL,
            claude_score INTEGER NOT NULL,
            quality_tier TEXT NOT NULL,
            connection_reason TEXT NOT NULL,
            is_used_in_essay INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (a_id, b_id),
            CHECK (a_id < b_id)
        );
        CREATE INDEX IF NOT EXISTS idx_pairs_tier_score ON thought_pairs(quality_tier, claude_score DESC);
        CREATE INDEX IF NOT EXISTS idx_pairs_used ON thought_pairs(is_used_in_essay);

        CREATE TABLE IF NOT EXISTS essays (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            outline_json TEXT NOT NULL,
            used_thoughts_json TEXT NOT NULL,
            reason TEXT NOT NULL,
            pair_a_id INTEGER NOT NULL,
            pair_b_id INTEGER NOT NULL,
            generated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS import_jobs (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            total_pages INTEGER NOT NULL DEFAULT 0,
            processed INTEGER NOT NULL DEFAULT 0,
            imported INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            failed_pages_json TEXT NOT NULL DEFAULT '[]',
            started_at TEXT NOT NULL,
            finished_at TEXT,
            config_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pair_mining_progress (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_src_id INTEGER,
            total_mined INTEGER NOT NULL DEFAULT 0,
            src_batch INTEGER NOT NULL,
            dst_sample INTEGER NOT NULL,
            k INTEGER NOT NULL,
            p_lo INTEGER NOT NULL,
            p_hi INTEGER NOT NULL,
            seed INTEGER NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS similarity_distribution_cache (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            percentiles_json TEXT NOT NULL,
            mean REAL NOT NULL,
            stddev REAL NOT NULL,
            thought_count INTEGER NOT NULL,
            total_pairs INTEGER NOT NULL,
            calculated_at TEXT NOT NULL,
            duration_ms INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}
