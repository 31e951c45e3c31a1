//! Scripted in-process provider for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{CompletionRequest, CompletionResponse, LLMProvider, ProviderError, ProviderResult};
use crate::runner::rate_limiter::RateLimiter;

/// Replays a fixed list of answers in order.
///
/// A `None` entry, or running past the end of the script, produces an API
/// error. Every request is recorded for inspection.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Option<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
    rate_limiter: Arc<RateLimiter>,
}

impl ScriptedProvider {
    /// Provider that answers with each string in turn
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_script(answers.into_iter().map(|a| Some(a.into())))
    }

    /// Provider whose script mixes answers (`Some`) and failures (`None`)
    pub fn from_script(script: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
            rate_limiter: Arc::new(RateLimiter::new(u32::MAX)),
        }
    }

    /// Provider that fails every call
    pub fn failing() -> Self {
        Self::from_script(std::iter::empty())
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Allow only `rpm` requests per minute
    pub fn with_rate_limit(mut self, rpm: u32) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(rpm));
        self
    }

    /// Number of requests received so far
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }

    /// Text of every user prompt received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| {
                requests
                    .iter()
                    .flat_map(|r| r.messages.iter().map(|m| m.content.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let next = {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            self.script.lock().ok().and_then(|mut s| s.pop_front())
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match next.flatten() {
            Some(content) => Ok(CompletionResponse {
                content,
                model: "scripted".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: "stop".to_string(),
                latency_ms: 0,
            }),
            None => Err(ProviderError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            }),
        }
    }

    fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}
