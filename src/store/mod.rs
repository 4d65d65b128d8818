//! Persistence layer (C2).
//!
//! `SqliteStore` owns the one persisted SQLite database. `vector` holds the
//! optional `sqlite-vec`-backed nearest-neighbor index used by the
//! distance-table fallback path when the table itself is empty.

pub mod schema;
pub mod sqlite;
pub mod traits;

#[cfg(feature = "embeddings")]
pub mod vector;

pub use sqlite::{cosine_similarity, SqliteStore};
pub use traits::{ChangedPages, PageStamp, StoreError, StoreResult};
