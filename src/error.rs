//! Crate-wide error taxonomy
//!
//! Component-local error enums (`StoreError`, `LlmError`, `NoteSourceError`,
//! `ConfigError`) convert into `SerendipityError` at the boundaries that need
//! a single type — the CLI entry point and the illustrative HTTP layer.
//! `ProgressTrackingFailure` and `UpstreamDeleted` are deliberately absent:
//! the former is logged and swallowed by `ingest::increment_job_progress`,
//! the latter is normal soft-delete control flow, never an error.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::notesource::NoteSourceError;
use crate::store::StoreError;

/// Top-level error type for the pipeline.
#[derive(Debug, Error)]
pub enum SerendipityError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failure: {0}")]
    ValidationFailure(String),

    #[error("partial batch: {succeeded} succeeded, {failed} failed")]
    PartialBatch { succeeded: usize, failed: usize },

    #[error("range misconfiguration: max_sim - min_sim = {} exceeds 0.8", max_sim - min_sim)]
    RangeMisconfiguration { min_sim: f32, max_sim: f32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    NoteSource(#[from] NoteSourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type SerendipityResult<T> = Result<T, SerendipityError>;
