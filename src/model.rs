//! Entity types for the pipeline's data model (spec §3)
//!
//! Identity newtypes follow the teacher's `NodeId` pattern: a thin wrapper
//! around the underlying primitive with `Display`/`From` impls, so call
//! sites read `ThoughtId` rather than a bare `i64`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable external page id from the note source. Opaque, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawNoteId(String);

impl RawNoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawNoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RawNoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RawNoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Monotonic integer identity for a `ThoughtUnit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThoughtId(pub i64);

impl fmt::Display for ThoughtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic integer identity for a `PairCandidate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub i64);

/// Monotonic integer identity for an `Essay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EssayId(pub i64);

/// A `(a, b)` pair of `ThoughtId`s, always stored with `a < b`.
///
/// Constructing via `new` orders the two ids, enforcing the invariant
/// every pair-shaped table in §3 depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub a: ThoughtId,
    pub b: ThoughtId,
}

impl PairKey {
    /// Returns `None` if `a == b` (spec §3 `PairCandidate` invariant: `a_id != b_id`).
    pub fn new(x: ThoughtId, y: ThoughtId) -> Option<Self> {
        if x == y {
            return None;
        }
        if x < y {
            Some(Self { a: x, b: y })
        } else {
            Some(Self { a: y, b: x })
        }
    }
}

/// A persisted copy of one external note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNote {
    pub id: RawNoteId,
    pub title: String,
    /// `None` when content is shorter than 10 chars after trim (spec §4.5 step 4).
    pub content: Option<String>,
    pub properties: HashMap<String, PropertyValue>,
    pub external_created_time: DateTime<Utc>,
    pub external_last_edited_time: DateTime<Utc>,
    pub imported_time: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A typed Notion-shaped property value (recovered from
/// `notion_service.py::_extract_property_value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Number(Option<f64>),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Date {
        start: Option<String>,
        end: Option<String>,
    },
    Checkbox(bool),
    Url(Option<String>),
    Email(Option<String>),
    Phone(Option<String>),
    Unsupported(String),
}

/// An atomic claim extracted from a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtUnit {
    pub id: ThoughtId,
    pub raw_note_id: RawNoteId,
    pub claim: String,
    pub context: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    pub extracted_time: DateTime<Utc>,
}

impl ThoughtUnit {
    pub const CLAIM_MIN_LEN: usize = 10;
    pub const CLAIM_MAX_LEN: usize = 500;
    pub const CONTEXT_MAX_LEN: usize = 200;

    /// Validates the `claim`/`context` length invariants from spec §3.
    pub fn validate_shape(claim: &str, context: Option<&str>) -> Result<(), String> {
        if claim.is_empty() {
            return Err("claim must not be empty".to_string());
        }
        let len = claim.chars().count();
        if !(Self::CLAIM_MIN_LEN..=Self::CLAIM_MAX_LEN).contains(&len) {
            return Err(format!(
                "claim length {} out of range [{}, {}]",
                len,
                Self::CLAIM_MIN_LEN,
                Self::CLAIM_MAX_LEN
            ));
        }
        if let Some(ctx) = context {
            if ctx.chars().count() > Self::CONTEXT_MAX_LEN {
                return Err(format!(
                    "context length {} exceeds {}",
                    ctx.chars().count(),
                    Self::CONTEXT_MAX_LEN
                ));
            }
        }
        Ok(())
    }
}

/// Cached cosine similarity for an unordered pair of thoughts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThoughtPairDistance {
    pub pair: PairKey,
    pub similarity: f32,
}

/// Status of an LLM evaluation attempt on a `PairCandidate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for LlmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmStatus::Pending => "pending",
            LlmStatus::Completed => "completed",
            LlmStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LlmStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown llm_status: {other}")),
        }
    }
}

/// A mined pair awaiting LLM evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairCandidate {
    pub id: CandidateId,
    pub pair: PairKey,
    pub similarity: f32,
    pub raw_note_id_a: RawNoteId,
    pub raw_note_id_b: RawNoteId,
    pub llm_status: LlmStatus,
    pub llm_attempts: u8,
    pub llm_score: Option<u8>,
    pub connection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub evaluation_error: Option<String>,
}

impl PairCandidate {
    pub const MAX_ATTEMPTS: u8 = 3;
}

/// Quality tier bands over `claude_score` (spec §3, §8 invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Standard,
    Premium,
    Excellent,
}

impl QualityTier {
    /// `score` is the `claude_score` in `0..=100`.
    pub fn from_score(score: u8) -> Option<Self> {
        match score {
            65..=84 => Some(Self::Standard),
            85..=94 => Some(Self::Premium),
            95..=100 => Some(Self::Excellent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Excellent => "excellent",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QualityTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "excellent" => Ok(Self::Excellent),
            other => Err(format!("unknown quality_tier: {other}")),
        }
    }
}

/// A curated, promoted pair suitable for essay seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtPair {
    pub pair: PairKey,
    pub similarity: f32,
    pub claude_score: u8,
    pub quality_tier: QualityTier,
    pub connection_reason: String,
    pub is_used_in_essay: bool,
}

/// A generated writing prompt seeded by exactly one `ThoughtPair`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Essay {
    pub id: EssayId,
    pub title: String,
    pub outline: [String; 3],
    pub used_thoughts: [UsedThought; 2],
    pub reason: String,
    pub pair: PairKey,
    pub generated_at: DateTime<Utc>,
}

impl Essay {
    pub const TITLE_MIN_LEN: usize = 5;
    pub const TITLE_MAX_LEN: usize = 100;
    pub const REASON_MAX_LEN: usize = 300;
}

/// Copy of one seed claim plus its source note's title/url, embedded in an `Essay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsedThought {
    pub claim: String,
    pub source_note_title: String,
    pub source_note_url: Option<String>,
}

/// Percentile snapshot over the distance table (singleton row, id = 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionCache {
    pub percentiles: Percentiles,
    pub mean: f64,
    pub stddev: f64,
    pub thought_count: u64,
    pub total_pairs: u64,
    pub calculated_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// p0..p100 percentile snapshot, indexed by the `p{N}` key used throughout §4.7/§4.8.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Percentiles {
    pub values: [f32; 101],
}

impl Percentiles {
    pub fn get(&self, p: u8) -> f32 {
        self.values[p.min(100) as usize]
    }
}

/// Status of a background `ImportJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Which note-source fetch mode an `ImportJob` ran with (SPEC_FULL §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    Database,
    ParentPage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJobConfig {
    pub fetch_mode: FetchMode,
    pub page_size: u32,
    pub fetch_all: bool,
}

/// A background ingest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: uuid::Uuid,
    pub status: JobStatus,
    pub total_pages: u32,
    pub processed: u32,
    pub imported: u32,
    pub skipped: u32,
    pub failed_pages: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config: ImportJobConfig,
}

impl ImportJob {
    pub fn new(id: uuid::Uuid, config: ImportJobConfig) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            total_pages: 0,
            processed: 0,
            imported: 0,
            skipped: 0,
            failed_pages: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            config,
        }
    }

    /// `processed = imported + skipped + len(failed_pages)` at terminal state (spec §3 invariant).
    pub fn is_consistent_at_terminal(&self) -> bool {
        self.processed == self.imported + self.skipped + self.failed_pages.len() as u32
    }
}

/// Status of a keyset-paged mining run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningStatus {
    Running,
    Completed,
    Failed,
}

/// Percentile-band mining strategy labels (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStrategy {
    P10P40,
    P30P60,
    P0P30,
    Custom { lo: u8, hi: u8 },
}

/// The keyset-paged state of a running mining run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningProgress {
    pub last_src_id: Option<ThoughtId>,
    pub total_mined: u64,
    pub src_batch: u32,
    pub dst_sample: u32,
    pub k: u32,
    pub p_lo: u8,
    pub p_hi: u8,
    pub seed: u64,
    pub status: MiningStatus,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_orders_ids() {
        let k = PairKey::new(ThoughtId(5), ThoughtId(2)).unwrap();
        assert!(k.a < k.b);
        assert_eq!(k.a, ThoughtId(2));
        assert_eq!(k.b, ThoughtId(5));
    }

    #[test]
    fn pair_key_rejects_self_pair() {
        assert!(PairKey::new(ThoughtId(1), ThoughtId(1)).is_none());
    }

    #[test]
    fn quality_tier_bands_match_spec() {
        assert_eq!(QualityTier::from_score(64), None);
        assert_eq!(QualityTier::from_score(65), Some(QualityTier::Standard));
        assert_eq!(QualityTier::from_score(84), Some(QualityTier::Standard));
        assert_eq!(QualityTier::from_score(85), Some(QualityTier::Premium));
        assert_eq!(QualityTier::from_score(94), Some(QualityTier::Premium));
        assert_eq!(QualityTier::from_score(95), Some(QualityTier::Excellent));
        assert_eq!(QualityTier::from_score(100), Some(QualityTier::Excellent));
    }

    #[test]
    fn claim_shape_validation() {
        assert!(ThoughtUnit::validate_shape("short", None).is_err());
        assert!(ThoughtUnit::validate_shape("this is a long enough claim", None).is_ok());
        assert!(ThoughtUnit::validate_shape("", None).is_err());
    }
}
