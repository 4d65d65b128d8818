//! Note source adapter (C3): fetches pages from an external knowledge-base
//! API and flattens their block content into plain-text/markdown.
//!
//! Grounded on `notion_service.py`: `_extract_property_value` gives
//! `model::PropertyValue`'s variant set, `fetch_page_blocks`'s per-type
//! markdown conversion gives `blocks::blocks_to_markdown`, and its
//! pagination / partial-content-on-error behavior is preserved exactly.

pub mod blocks;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::PropertyValue;

pub use http::HttpNoteSource;
pub use mock::MockNoteSource;

#[derive(Debug, Error)]
pub enum NoteSourceError {
    #[error("note source request failed: {0}")]
    RequestFailed(String),

    #[error("rate limited")]
    RateLimited,

    #[error("page not found: {0}")]
    PageNotFound(String),
}

/// One raw page fetched from the note source, before persistence (spec §4.5).
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub id: String,
    pub title: String,
    pub content: String,
    pub properties: HashMap<String, PropertyValue>,
    pub created_time: DateTime<Utc>,
    pub last_edited_time: DateTime<Utc>,
}

/// A minimal page summary used by `get_changed_pages` (spec §4.2): no body
/// content, just enough to diff against what's stored.
#[derive(Debug, Clone)]
pub struct PageSummary {
    pub id: String,
    pub last_edited_time: DateTime<Utc>,
}

/// Abstracts over fetch mode (database query vs. parent-page children) and
/// transport, so the ingest pipeline never talks to an HTTP client directly.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// List page summaries for change detection, one page of up to
    /// `page_size` results at a time. `cursor` is the opaque continuation
    /// token from a previous call's return value.
    async fn list_page_summaries(
        &self,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<(Vec<PageSummary>, Option<String>), NoteSourceError>;

    /// Fetch one page's properties and flattened block content.
    async fn fetch_page(&self, page_id: &str) -> Result<FetchedPage, NoteSourceError>;
}
