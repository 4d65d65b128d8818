//! Persistent vector index via sqlite-vec, feature-gated behind `embeddings`.
//!
//! Grounded on the teacher's `storage::sqlite_vec::SqliteVecStore`: a
//! separate connection holding a `vec0` virtual table, vectors L2-normalized
//! on insert so KNN distance converts to cosine similarity
//! (`sim = 1 - dist^2 / 2`). Used by `find_similar_pairs_topk` as the
//! nearest-neighbor source when the cached distance table is still empty
//! (spec §4.7/§4.8 fallback path).

use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::{Mutex, Once};

use crate::model::ThoughtId;

static INIT: Once = Once::new();

fn register_vec_extension() {
    INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

pub struct VectorIndex {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl VectorIndex {
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, String> {
        register_vec_extension();
        let conn = Connection::open(path).map_err(|e| e.to_string())?;
        Self::init_connection(conn, dimensions)
    }

    pub fn open_in_memory(dimensions: usize) -> Result<Self, String> {
        register_vec_extension();
        let conn = Connection::open_in_memory().map_err(|e| e.to_string())?;
        Self::init_connection(conn, dimensions)
    }

    fn init_connection(conn: Connection, dimensions: usize) -> Result<Self, String> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| e.to_string())?;
        let create_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_thoughts USING vec0(\
                 thought_id INTEGER PRIMARY KEY,\
                 embedding float[{dimensions}]\
             )"
        );
        conn.execute_batch(&create_sql).map_err(|e| e.to_string())?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn upsert(&self, id: ThoughtId, vector: &[f32]) {
        let mut normalized = vector.to_vec();
        l2_normalize(&mut normalized);
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_as_bytes(&normalized);
        conn.execute(
            "INSERT OR REPLACE INTO vec_thoughts(thought_id, embedding) VALUES (?1, ?2)",
            rusqlite::params![id.0, bytes],
        )
        .expect("vec_thoughts insert failed");
    }

    /// Nearest `k` neighbors above `min_sim`, converting L2 distance on
    /// normalized vectors to cosine similarity.
    pub fn find_similar(&self, query: &[f32], k: u32, min_sim: f32) -> Vec<(ThoughtId, f32)> {
        let mut normalized_query = query.to_vec();
        l2_normalize(&mut normalized_query);
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_as_bytes(&normalized_query);

        let mut stmt = conn
            .prepare(
                "SELECT thought_id, distance FROM vec_thoughts
                 WHERE embedding MATCH ?1 AND k = ?2",
            )
            .expect("vec_thoughts KNN prepare failed");

        stmt.query_map(rusqlite::params![bytes, k], |row| {
            let id: i64 = row.get(0)?;
            let distance: f32 = row.get(1)?;
            Ok((ThoughtId(id), distance))
        })
        .expect("vec_thoughts KNN query failed")
        .filter_map(|r| r.ok())
        .filter_map(|(id, distance)| {
            let similarity = 1.0 - (distance * distance) / 2.0;
            (similarity >= min_sim).then_some((id, similarity))
        })
        .collect()
    }
}

fn f32_slice_as_bytes(slice: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, slice.len() * 4) }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
