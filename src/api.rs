//! Illustrative HTTP surface (spec §6.1): request/response DTOs for the
//! pipeline endpoints, not wired to any HTTP framework. Tests and callers
//! drive the core directly through `ingest`/`thoughts`/`distance`/`mining`/
//! `scoring`/`recommend`/`essay`; this module exists so the shapes those
//! endpoints would serialize are grounded somewhere concrete.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Essay, ImportJob, JobStatus, QualityTier, ThoughtPair};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFromNoteSourceRequest {
    pub page_size: Option<u32>,
    pub fetch_all: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFromNoteSourceResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStatusResponse {
    pub job: ImportJob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractThoughtsRequest {
    pub auto_update_distance_table: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractThoughtsResponse {
    pub notes_processed: usize,
    pub thoughts_extracted: usize,
    pub distance_table_updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DistanceTableOp {
    Build,
    Update,
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceTableResponse {
    pub op: DistanceTableOp,
    pub rows_affected: u64,
    pub total_pairs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectCandidatesRequest {
    pub strategy: String,
    pub use_distance_table: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectCandidatesResponse {
    pub candidates_inserted: usize,
    pub query_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleInitialRequest {
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleInitialResponse {
    pub sampled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCandidatesRequest {
    pub max_candidates: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCandidatesResponse {
    pub evaluated: usize,
    pub migrated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedEssaysQuery {
    pub limit: u32,
    pub quality_tiers: Option<Vec<QualityTier>>,
    pub diversity_weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedEssaysResponse {
    pub pairs: Vec<ThoughtPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateEssaysRequest {
    pub max_pairs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateEssaysResponse {
    pub generated: Vec<Essay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEssaysQuery {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEssaysResponse {
    pub essays: Vec<Essay>,
}
