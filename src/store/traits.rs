//! Store error type and the disjoint-set/paging result shapes used by the
//! stored-procedure-shaped operations in spec §4.2.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("note not found: {0}")]
    NoteNotFound(String),

    #[error("thought not found: {0}")]
    ThoughtNotFound(i64),

    #[error("pair not found: ({0}, {1})")]
    PairNotFound(i64, i64),

    #[error("similarity band too wide: max_sim - min_sim = {} exceeds 0.8", .max_sim - .min_sim)]
    RangeMisconfiguration { min_sim: f32, max_sim: f32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of `get_changed_pages` (spec §4.2): three disjoint id sets plus the
/// count of pages that matched with no change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedPages {
    pub new_ids: Vec<String>,
    pub updated_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
    pub unchanged_count: usize,
}

/// One page's external id and truncated-to-seconds `last_edited_time`, as
/// handed to `get_changed_pages`.
#[derive(Debug, Clone)]
pub struct PageStamp {
    pub id: String,
    pub last_edited_time: chrono::DateTime<chrono::Utc>,
}
