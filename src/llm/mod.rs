//! LLM client abstraction (C6 / C9 / C11 dependency).
//!
//! Grounded on the teacher's `llm_orc::LlmOrcClient` trait: one trait over
//! transport, a `MockClient`-style builder for tests, and a production
//! client behind `reqwest` (the teacher calls a local subprocess over MCP;
//! this system calls a hosted chat-completion endpoint over HTTP instead —
//! grounded on `danielmriley-aigent`'s `llm` crate, which reaches for
//! reqwest for the same purpose).

pub mod http;
pub mod json;
pub mod mock;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpLlmClient;
pub use mock::MockLlmClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    RequestFailed(String),

    #[error("rate limited")]
    RateLimited,

    #[error("response parse error: {0}")]
    ParseError(String),

    #[error("no mock response configured for this call")]
    NoMockResponse,
}

/// One extracted atomic claim plus optional context (spec §4.6 step 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedThought {
    pub claim: String,
    #[serde(default)]
    pub context: Option<String>,
}

/// Score plus reason for a single candidate pair (spec §4.9 step 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub thought_a_id: i64,
    pub thought_b_id: i64,
    pub logical_expansion_score: u8,
    pub connection_reason: String,
}

/// Generated essay prompt content (spec §4.11 step 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEssay {
    pub title: String,
    pub outline: Vec<String>,
    pub reason: String,
}

/// One pair handed into `score_pairs`, already denormalized with claim text
/// so the client doesn't need store access.
#[derive(Debug, Clone)]
pub struct ScoringCandidate {
    pub thought_a_id: i64,
    pub thought_b_id: i64,
    pub claim_a: String,
    pub claim_b: String,
    pub similarity: f32,
}

/// Abstracts over the LLM transport so the pipeline's core logic doesn't
/// depend on which provider or wire protocol sits behind it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Extract 1-5 atomic thought units from a note's title and content
    /// (spec §4.6 step 2).
    async fn extract_thoughts(
        &self,
        title: &str,
        content: &str,
    ) -> Result<Vec<ExtractedThought>, LlmError>;

    /// Score a batch of candidate pairs (spec §4.9 step 3). Callers chunk to
    /// `max_pairs_per_batch` themselves; this call evaluates exactly what it
    /// is given.
    async fn score_pairs(&self, candidates: &[ScoringCandidate]) -> Result<Vec<PairScore>, LlmError>;

    /// Generate an essay prompt from two claims (spec §4.11 step 2).
    async fn generate_essay(
        &self,
        claim_a: &str,
        claim_b: &str,
        connection_reason: &str,
    ) -> Result<GeneratedEssay, LlmError>;
}
