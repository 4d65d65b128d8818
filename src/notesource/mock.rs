//! In-memory note source for tests, grounded on the llm module's
//! `MockLlmClient` builder style.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{FetchedPage, NoteSource, NoteSourceError, PageSummary};

pub struct MockNoteSource {
    pages: Mutex<Vec<FetchedPage>>,
    fail_fetch: bool,
}

impl MockNoteSource {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            fail_fetch: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            fail_fetch: true,
        }
    }

    pub fn with_page(self, page: FetchedPage) -> Self {
        self.pages.lock().unwrap().push(page);
        self
    }
}

impl Default for MockNoteSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteSource for MockNoteSource {
    async fn list_page_summaries(
        &self,
        page_size: u32,
        cursor: Option<String>,
    ) -> Result<(Vec<PageSummary>, Option<String>), NoteSourceError> {
        let pages = self.pages.lock().unwrap();
        let offset = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let end = (offset + page_size as usize).min(pages.len());
        let summaries = pages[offset..end]
            .iter()
            .map(|p| PageSummary {
                id: p.id.clone(),
                last_edited_time: p.last_edited_time,
            })
            .collect();
        let next_cursor = (end < pages.len()).then(|| end.to_string());
        Ok((summaries, next_cursor))
    }

    async fn fetch_page(&self, page_id: &str) -> Result<FetchedPage, NoteSourceError> {
        if self.fail_fetch {
            return Err(NoteSourceError::RequestFailed("mock configured to fail".to_string()));
        }
        self.pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == page_id)
            .cloned()
            .ok_or_else(|| NoteSourceError::PageNotFound(page_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn page(id: &str) -> FetchedPage {
        FetchedPage {
            id: id.to_string(),
            title: format!("note {id}"),
            content: "body".to_string(),
            properties: HashMap::new(),
            created_time: Utc::now(),
            last_edited_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn lists_and_fetches_pages() {
        let source = MockNoteSource::new().with_page(page("p1")).with_page(page("p2"));
        let (summaries, cursor) = source.list_page_summaries(10, None).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(cursor.is_none());

        let fetched = source.fetch_page("p1").await.unwrap();
        assert_eq!(fetched.title, "note p1");
    }

    #[tokio::test]
    async fn paginates_when_page_size_is_smaller_than_total() {
        let source = MockNoteSource::new().with_page(page("p1")).with_page(page("p2"));
        let (first, cursor) = source.list_page_summaries(1, None).await.unwrap();
        assert_eq!(first.len(), 1);
        let cursor = cursor.expect("should have a next cursor");
        let (second, cursor2) = source.list_page_summaries(1, Some(cursor)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(cursor2.is_none());
    }
}
