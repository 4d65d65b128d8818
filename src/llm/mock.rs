//! Mock LLM client for tests, grounded on `llm_orc::MockClient`: builder
//! methods register canned responses keyed by input, `available()`/
//! `unavailable()` constructors toggle the happy path.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ExtractedThought, GeneratedEssay, LlmClient, LlmError, PairScore, ScoringCandidate};

pub struct MockLlmClient {
    available: bool,
    thoughts_queue: Mutex<VecDeque<Result<Vec<ExtractedThought>, LlmError>>>,
    scores_queue: Mutex<VecDeque<Result<Vec<PairScore>, LlmError>>>,
    essay_queue: Mutex<VecDeque<Result<GeneratedEssay, LlmError>>>,
}

impl MockLlmClient {
    pub fn available() -> Self {
        Self {
            available: true,
            thoughts_queue: Mutex::new(VecDeque::new()),
            scores_queue: Mutex::new(VecDeque::new()),
            essay_queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn with_thoughts(self, thoughts: Vec<ExtractedThought>) -> Self {
        self.thoughts_queue.lock().unwrap().push_back(Ok(thoughts));
        self
    }

    pub fn with_thoughts_failure(self, err: LlmError) -> Self {
        self.thoughts_queue.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_scores(self, scores: Vec<PairScore>) -> Self {
        self.scores_queue.lock().unwrap().push_back(Ok(scores));
        self
    }

    pub fn with_scores_failure(self, err: LlmError) -> Self {
        self.scores_queue.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_essay(self, essay: GeneratedEssay) -> Self {
        self.essay_queue.lock().unwrap().push_back(Ok(essay));
        self
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn extract_thoughts(
        &self,
        _title: &str,
        _content: &str,
    ) -> Result<Vec<ExtractedThought>, LlmError> {
        if !self.available {
            return Err(LlmError::RequestFailed("mock client unavailable".to_string()));
        }
        self.thoughts_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::NoMockResponse))
    }

    async fn score_pairs(&self, _candidates: &[ScoringCandidate]) -> Result<Vec<PairScore>, LlmError> {
        if !self.available {
            return Err(LlmError::RequestFailed("mock client unavailable".to_string()));
        }
        self.scores_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::NoMockResponse))
    }

    async fn generate_essay(
        &self,
        _claim_a: &str,
        _claim_b: &str,
        _connection_reason: &str,
    ) -> Result<GeneratedEssay, LlmError> {
        if !self.available {
            return Err(LlmError::RequestFailed("mock client unavailable".to_string()));
        }
        self.essay_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::NoMockResponse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_queued_thoughts_in_order() {
        let client = MockLlmClient::available().with_thoughts(vec![ExtractedThought {
            claim: "a claim long enough to pass validation".to_string(),
            context: None,
        }]);
        let result = client.extract_thoughts("t", "c").await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_client_fails_every_call() {
        let client = MockLlmClient::unavailable();
        assert!(client.extract_thoughts("t", "c").await.is_err());
    }
}
