//! Serendipity: a mining engine that surfaces unexpected conceptual pairs
//! across a personal note corpus and drafts short essays exploring them.
//!
//! # Core Concepts
//!
//! - **Raw notes**: pages fetched from an external note source, flattened
//!   to markdown and tracked for incremental re-import.
//! - **Thought units**: atomic claims extracted from a note by an LLM,
//!   each embedded into a fixed-dimension vector space.
//! - **Pair candidates**: thought-unit pairs drawn from a similarity band,
//!   scored by an LLM and promoted into curated `thought_pairs` once they
//!   clear the promotion threshold.
//! - **Essays**: short generated pieces exploring why a curated pair is an
//!   interesting connection.
//!
//! # Example
//!
//! ```no_run
//! use serendipity::config::Settings;
//!
//! let settings = Settings::from_env();
//! ```

pub mod api;
pub mod config;
pub mod distance;
pub mod embedding;
pub mod error;
pub mod essay;
pub mod ingest;
pub mod llm;
pub mod mining;
pub mod model;
pub mod notesource;
pub mod ratelimit;
pub mod recommend;
pub mod scoring;
pub mod store;
pub mod thoughts;

pub use distance::DistanceEngine;
pub use embedding::Embedder;
pub use error::{SerendipityError, SerendipityResult};
pub use essay::EssayGenerator;
pub use ingest::IngestPipeline;
pub use llm::LlmClient;
pub use mining::CandidateMiner;
pub use notesource::NoteSource;
pub use recommend::RecommendationEngine;
pub use scoring::BatchEvaluationWorker;
pub use store::SqliteStore;
pub use thoughts::ThoughtExtractor;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
