//! Production LLM client: a reqwest-based OpenAI-compatible chat completion
//! caller. Grounded on `danielmriley-aigent`'s `llm::OpenRouterClient` for
//! the request shape, and on the teacher's rate-limiter-gated call pattern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::ratelimit::{Backoff, RateLimiter};

use super::json::safe_json_parse;
use super::prompts::{
    essay_prompt, extract_prompt, score_prompt, simplified_score_prompt, ESSAY_SYSTEM_MESSAGE,
    EXTRACT_SYSTEM_MESSAGE, SCORE_SYSTEM_MESSAGE,
};
use super::{ExtractedThought, GeneratedEssay, LlmClient, LlmError, PairScore, ScoringCandidate};

const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    rate_limiter: Arc<RateLimiter>,
    backoff: Backoff,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            rate_limiter: Arc::new(RateLimiter::new(1.0)),
            backoff: Backoff::default(),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    async fn complete(
        &self,
        system_message: &str,
        prompt: String,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let mut last_err = None;
        for attempt in 0..=DEFAULT_MAX_RETRIES {
            self.rate_limiter
                .acquire()
                .await
                .map_err(|_| LlmError::RateLimited)?;

            let request = ChatCompletionRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: system_message.to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: prompt.clone(),
                    },
                ],
                max_tokens,
                temperature: 1.0,
            };

            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: ChatCompletionResponse = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    let content = parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| LlmError::ParseError("no choices in response".to_string()))?;
                    return Ok(content);
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    last_err = Some(LlmError::RateLimited);
                }
                Ok(resp) => {
                    last_err = Some(LlmError::RequestFailed(format!(
                        "provider returned status {}",
                        resp.status()
                    )));
                }
                Err(e) => {
                    last_err = Some(LlmError::RequestFailed(e.to_string()));
                }
            }

            if attempt < DEFAULT_MAX_RETRIES {
                self.backoff.sleep(attempt).await;
            }
        }
        Err(last_err.unwrap_or(LlmError::RequestFailed("exhausted retries".to_string())))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn extract_thoughts(
        &self,
        title: &str,
        content: &str,
    ) -> Result<Vec<ExtractedThought>, LlmError> {
        let raw = self
            .complete(EXTRACT_SYSTEM_MESSAGE, extract_prompt(title, content), 2000)
            .await?;
        let parsed = safe_json_parse(&raw)
            .ok_or_else(|| LlmError::ParseError("could not extract JSON from response".to_string()))?;
        #[derive(Deserialize)]
        struct Envelope {
            thoughts: Vec<ExtractedThought>,
        }
        let envelope: Envelope =
            serde_json::from_value(parsed).map_err(|e| LlmError::ParseError(e.to_string()))?;
        Ok(envelope.thoughts)
    }

    async fn score_pairs(&self, candidates: &[ScoringCandidate]) -> Result<Vec<PairScore>, LlmError> {
        #[derive(Deserialize)]
        struct Envelope {
            pair_scores: Vec<PairScore>,
        }

        let mut prompt = score_prompt(candidates);
        let mut last_err = None;
        for attempt in 0..=DEFAULT_MAX_RETRIES {
            let raw = self.complete(SCORE_SYSTEM_MESSAGE, prompt.clone(), 2000).await?;
            match safe_json_parse(&raw).and_then(|v| serde_json::from_value::<Envelope>(v).ok()) {
                Some(envelope) => return Ok(envelope.pair_scores),
                None => {
                    last_err = Some(LlmError::ParseError(format!(
                        "failed to parse pair scores on attempt {}",
                        attempt + 1
                    )));
                    if attempt < DEFAULT_MAX_RETRIES {
                        prompt = simplified_score_prompt(candidates);
                    }
                }
            }
        }
        Err(last_err.unwrap_or(LlmError::ParseError("unknown parse failure".to_string())))
    }

    async fn generate_essay(
        &self,
        claim_a: &str,
        claim_b: &str,
        connection_reason: &str,
    ) -> Result<GeneratedEssay, LlmError> {
        let raw = self
            .complete(
                ESSAY_SYSTEM_MESSAGE,
                essay_prompt(claim_a, claim_b, connection_reason),
                1024,
            )
            .await?;
        let parsed = safe_json_parse(&raw)
            .ok_or_else(|| LlmError::ParseError("could not extract JSON from response".to_string()))?;
        serde_json::from_value(parsed).map_err(|e| LlmError::ParseError(e.to_string()))
    }
}
