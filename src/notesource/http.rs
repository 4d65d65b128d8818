//! Production note-source client over HTTP. Grounded on
//! `notion_service.py::query_database` / `fetch_page_blocks`: paginate
//! `page_size`-sized batches via a `start_cursor`/`has_more` loop, and on a
//! mid-fetch error return whatever block content was accumulated so far
//! rather than propagating the failure (spec §4.3/§4.5: partial content is
//! preferred over no content).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::FetchTarget;
use crate::model::PropertyValue;
use crate::ratelimit::RateLimiter;

use super::blocks::{blocks_to_markdown, extract_rich_text, Block, RichTextSpan};
use super::{FetchedPage, NoteSource, NoteSourceError, PageSummary};

const BLOCK_PAGE_SIZE: u32 = 100;

pub struct HttpNoteSource {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    fetch_target: FetchTarget,
    rate_limiter: Arc<RateLimiter>,
}

impl HttpNoteSource {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>, fetch_target: FetchTarget) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_token: api_token.into(),
            fetch_target,
            rate_limiter: Arc::new(RateLimiter::new(3.0)),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Fetches and flattens every block under `page_id`, paging through
    /// `start_cursor`. On a request failure mid-pagination, returns whatever
    /// markdown was accumulated from prior successful pages instead of
    /// failing the whole call.
    async fn fetch_blocks(&self, page_id: &str) -> String {
        let mut all_blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            if self.rate_limiter.acquire().await.is_err() {
                break;
            }

            let mut url = format!(
                "{}/blocks/{}/children?page_size={}",
                self.base_url, page_id, BLOCK_PAGE_SIZE
            );
            if let Some(c) = &cursor {
                url.push_str(&format!("&start_cursor={c}"));
            }

            let response = self.client.get(&url).bearer_auth(&self.api_token).send().await;
            let batch = match response {
                Ok(resp) if resp.status().is_success() => resp.json::<BlockListResponse>().await.ok(),
                _ => None,
            };

            let Some(batch) = batch else {
                break;
            };

            all_blocks.extend(batch.results.into_iter().map(raw_block_to_block));

            if !batch.has_more || batch.next_cursor.is_none() {
                break;
            }
            cursor = batch.next_cursor;
        }

        blocks_to_markdown(&all_blocks)
    }
}

#[async_trait]
impl NoteSource for HttpNoteSource {
    async fn list_page_summaries(
        &self,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<(Vec<PageSummary>, Option<String>), NoteSourceError> {
        self.rate_limiter
            .acquire()
            .await
            .map_err(|_| NoteSourceError::RateLimited)?;

        let url = match &self.fetch_target {
            FetchTarget::Database { database_id } => {
                format!("{}/databases/{}/query", self.base_url, database_id)
            }
            FetchTarget::ParentPage { parent_page_id } => {
                format!("{}/blocks/{}/children", self.base_url, parent_page_id)
            }
        };

        let request = match &self.fetch_target {
            FetchTarget::Database { .. } => {
                self.client.post(&url).bearer_auth(&self.api_token).json(&serde_json::json!({
                    "page_size": page_size,
                    "start_cursor": cursor,
                }))
            }
            FetchTarget::ParentPage { .. } => self.client.get(&url).bearer_auth(&self.api_token),
        };

        let response = request
            .send()
            .await
            .map_err(|e| NoteSourceError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NoteSourceError::RequestFailed(format!(
                "note source returned status {}",
                response.status()
            )));
        }

        let parsed: PageListResponse = response
            .json()
            .await
            .map_err(|e| NoteSourceError::RequestFailed(e.to_string()))?;

        let summaries = parsed
            .results
            .iter()
            .map(|p| PageSummary {
                id: p.id.clone(),
                last_edited_time: p.last_edited_time,
            })
            .collect();

        let next_cursor = parsed.has_more.then_some(parsed.next_cursor).flatten();
        Ok((summaries, next_cursor))
    }

    async fn fetch_page(&self, page_id: &str) -> Result<FetchedPage, NoteSourceError> {
        self.rate_limiter
            .acquire()
            .await
            .map_err(|_| NoteSourceError::RateLimited)?;

        let url = format!("{}/pages/{}", self.base_url, page_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| NoteSourceError::RequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(NoteSourceError::PageNotFound(page_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(NoteSourceError::RequestFailed(format!(
                "note source returned status {}",
                response.status()
            )));
        }

        let raw: RawPage = response
            .json()
            .await
            .map_err(|e| NoteSourceError::RequestFailed(e.to_string()))?;

        let properties: HashMap<String, PropertyValue> = raw
            .properties
            .into_iter()
            .map(|(name, prop)| (name, extract_property_value(prop)))
            .collect();

        let title = properties
            .values()
            .find_map(|v| match v {
                PropertyValue::Title(t) => Some(t.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "Untitled".to_string());

        let content = self.fetch_blocks(page_id).await;

        Ok(FetchedPage {
            id: raw.id,
            title,
            content,
            properties,
            created_time: raw.created_time,
            last_edited_time: raw.last_edited_time,
        })
    }
}

#[derive(Deserialize)]
struct PageListResponse {
    results: Vec<RawPageSummary>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct RawPageSummary {
    id: String,
    last_edited_time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawPage {
    id: String,
    created_time: DateTime<Utc>,
    last_edited_time: DateTime<Utc>,
    #[serde(default)]
    properties: HashMap<String, RawProperty>,
}

#[derive(Deserialize)]
struct RawProperty {
    #[serde(rename = "type")]
    prop_type: String,
    #[serde(default)]
    title: Vec<RichTextSpan>,
    #[serde(default)]
    rich_text: Vec<RichTextSpan>,
    #[serde(default)]
    number: Option<f64>,
    #[serde(default)]
    select: Option<SelectValue>,
    #[serde(default)]
    multi_select: Vec<SelectValue>,
    #[serde(default)]
    date: Option<DateValue>,
    #[serde(default)]
    checkbox: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
}

#[derive(Deserialize)]
struct SelectValue {
    name: String,
}

#[derive(Deserialize)]
struct DateValue {
    start: Option<String>,
    end: Option<String>,
}

fn extract_property_value(prop: RawProperty) -> PropertyValue {
    match prop.prop_type.as_str() {
        "title" => PropertyValue::Title(extract_rich_text(&prop.title)),
        "rich_text" => PropertyValue::RichText(extract_rich_text(&prop.rich_text)),
        "number" => PropertyValue::Number(prop.number),
        "select" => PropertyValue::Select(prop.select.map(|s| s.name)),
        "multi_select" => PropertyValue::MultiSelect(prop.multi_select.into_iter().map(|s| s.name).collect()),
        "date" => PropertyValue::Date {
            start: prop.date.as_ref().and_then(|d| d.start.clone()),
            end: prop.date.and_then(|d| d.end),
        },
        "checkbox" => PropertyValue::Checkbox(prop.checkbox),
        "url" => PropertyValue::Url(prop.url),
        "email" => PropertyValue::Email(prop.email),
        "phone_number" => PropertyValue::Phone(prop.phone_number),
        other => PropertyValue::Unsupported(format!("Unsupported type: {other}")),
    }
}

#[derive(Deserialize)]
struct BlockListResponse {
    results: Vec<RawBlock>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct RawBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    paragraph: Option<RawTextBlock>,
    #[serde(default)]
    heading_1: Option<RawTextBlock>,
    #[serde(default)]
    heading_2: Option<RawTextBlock>,
    #[serde(default)]
    heading_3: Option<RawTextBlock>,
    #[serde(default)]
    bulleted_list_item: Option<RawTextBlock>,
    #[serde(default)]
    numbered_list_item: Option<RawTextBlock>,
    #[serde(default)]
    quote: Option<RawTextBlock>,
    #[serde(default)]
    callout: Option<RawCalloutBlock>,
    #[serde(default)]
    code: Option<RawCodeBlock>,
    #[serde(default)]
    toggle: Option<RawTextBlock>,
}

#[derive(Deserialize)]
struct RawTextBlock {
    #[serde(default)]
    rich_text: Vec<RichTextSpan>,
}

#[derive(Deserialize)]
struct RawCalloutBlock {
    #[serde(default)]
    rich_text: Vec<RichTextSpan>,
    #[serde(default)]
    icon: Option<RawIcon>,
}

#[derive(Deserialize)]
struct RawIcon {
    #[serde(default)]
    emoji: Option<String>,
}

#[derive(Deserialize)]
struct RawCodeBlock {
    #[serde(default)]
    rich_text: Vec<RichTextSpan>,
    #[serde(default)]
    language: String,
}

fn raw_block_to_block(raw: RawBlock) -> Block {
    match raw.block_type.as_str() {
        "paragraph" => Block::Paragraph {
            text: extract_rich_text(&raw.paragraph.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text),
        },
        "heading_1" => Block::Heading1 {
            text: extract_rich_text(&raw.heading_1.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text),
        },
        "heading_2" => Block::Heading2 {
            text: extract_rich_text(&raw.heading_2.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text),
        },
        "heading_3" => Block::Heading3 {
            text: extract_rich_text(&raw.heading_3.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text),
        },
        "bulleted_list_item" => Block::BulletedListItem {
            text: extract_rich_text(
                &raw.bulleted_list_item.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text,
            ),
        },
        "numbered_list_item" => Block::NumberedListItem {
            text: extract_rich_text(
                &raw.numbered_list_item.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text,
            ),
        },
        "quote" => Block::Quote {
            text: extract_rich_text(&raw.quote.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text),
        },
        "callout" => {
            let callout = raw.callout.unwrap_or(RawCalloutBlock {
                rich_text: vec![],
                icon: None,
            });
            Block::Callout {
                text: extract_rich_text(&callout.rich_text),
                emoji: callout.icon.and_then(|i| i.emoji),
            }
        }
        "code" => {
            let code = raw.code.unwrap_or(RawCodeBlock {
                rich_text: vec![],
                language: String::new(),
            });
            Block::Code {
                text: extract_rich_text(&code.rich_text),
                language: code.language,
            }
        }
        "toggle" => Block::Toggle {
            text: extract_rich_text(&raw.toggle.unwrap_or(RawTextBlock { rich_text: vec![] }).rich_text),
        },
        _ => Block::Unsupported,
    }
}
