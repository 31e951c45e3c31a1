//! Single-request execution against the configured provider

use std::sync::Arc;
use std::time::Duration;

use crate::config::RunConfig;
use crate::providers::{CompletionRequest, ImageAttachment, LLMProvider, Message, ProviderError, ProviderResult};

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Completion token cap per request
    pub max_tokens: u32,
    /// Sampling temperature; provider default when `None`
    pub temperature: Option<f32>,
    /// Request timeout in milliseconds, counted from the moment a
    /// rate-limit slot is claimed
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: None,
            timeout_ms: 120_000,
        }
    }
}

impl From<&RunConfig> for ExecutorConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            max_tokens: run.max_tokens,
            temperature: run.temperature,
            timeout_ms: run.timeout_ms,
        }
    }
}

/// Sends one prompt plus one image and returns the trimmed answer text.
///
/// There is no retry: a failed call is reported to the caller, which
/// records the row as missing and moves on.
pub struct Executor {
    provider: Arc<dyn LLMProvider>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: ExecutorConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.default_model()
    }

    /// Ask about one image
    pub async fn ask(&self, prompt: &str, image: ImageAttachment) -> ProviderResult<String> {
        let mut request = CompletionRequest::new(
            vec![Message::user(prompt).with_image(image)],
            self.config.max_tokens,
        );
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let rate_limiter = self.provider.rate_limiter();
        rate_limiter.acquire().await;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = match tokio::time::timeout(timeout, self.provider.complete(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProviderError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                })
            }
        };

        let recent_tokens = rate_limiter.current_token_usage().await;
        tracing::debug!(
            "{} answered in {}ms ({} in / {} out tokens, {} in the last minute, finish: {})",
            response.model,
            response.latency_ms,
            response.input_tokens,
            response.output_tokens,
            recent_tokens,
            response.finish_reason
        );

        Ok(response.content.trim().to_string())
    }
}

/// Outcome of one row of a stage
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Target column already populated
    Skipped,
    /// Image file not found
    MissingImage,
    /// Provider call or image read failed
    Failed(String),
    /// Model answered; `count` is `None` for text or unparseable answers
    Answered { text: String, count: Option<i64> },
}

/// Progress callback for tracking stage execution
pub trait ProgressCallback: Send + Sync {
    fn on_row_complete(&self, filename: &str, outcome: &RowOutcome);
    fn on_progress(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_row_complete(&self, _filename: &str, _outcome: &RowOutcome) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_row_complete(&self, filename: &str, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Skipped => {}
            RowOutcome::MissingImage => println!("  MISSING {}", filename),
            RowOutcome::Failed(e) => println!("  FAILED  {}: {}", filename, e),
            RowOutcome::Answered { text, count: Some(count) } if text.trim() == count.to_string() => {
                println!("  OK      {}: {}", filename, count)
            }
            RowOutcome::Answered { text, .. } => {
                let first_line = text.lines().next().unwrap_or_default();
                println!("  OK      {}: {}", filename, first_line)
            }
        }
    }

    fn on_progress(&self, completed: usize, total: usize) {
        if completed % 25 == 0 || completed == total {
            println!("Progress: {}/{} rows", completed, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::ScriptedProvider;

    fn image() -> ImageAttachment {
        ImageAttachment::new("image/jpeg", "QUJD")
    }

    #[tokio::test]
    async fn test_ask_trims_answer() {
        let provider = Arc::new(ScriptedProvider::new(["  42\n"]));
        let executor = Executor::new(provider.clone(), ExecutorConfig::default());

        assert_eq!(executor.ask("count", image()).await.unwrap(), "42");
        let request = provider.last_request().unwrap();
        assert_eq!(request.messages[0].images.len(), 1);
        assert_eq!(request.temperature, None);
    }

    #[tokio::test]
    async fn test_ask_applies_temperature() {
        let provider = Arc::new(ScriptedProvider::new(["1"]));
        let config = ExecutorConfig {
            temperature: Some(0.0),
            ..Default::default()
        };
        let executor = Executor::new(provider.clone(), config);

        executor.ask("count", image()).await.unwrap();
        assert_eq!(provider.last_request().unwrap().temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_ask_surfaces_provider_error() {
        let provider = Arc::new(ScriptedProvider::failing());
        let executor = Executor::new(provider, ExecutorConfig::default());

        assert!(matches!(
            executor.ask("count", image()).await,
            Err(ProviderError::Api { .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_wait_does_not_count_against_timeout() {
        let provider = Arc::new(ScriptedProvider::new(["5"]).with_rate_limit(1));
        provider.rate_limiter().acquire().await;
        let config = ExecutorConfig {
            timeout_ms: 20,
            ..Default::default()
        };
        let executor = Executor::new(provider.clone(), config);

        // The window stays full for a minute, so `ask` is still waiting
        // for a slot long after its own 20ms timeout would have fired.
        let waited = tokio::time::timeout(Duration::from_millis(200), executor.ask("count", image())).await;
        assert!(waited.is_err());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_ask_claims_rate_limit_slot() {
        let provider = Arc::new(ScriptedProvider::new(["5", "6"]).with_rate_limit(2));
        let executor = Executor::new(provider.clone(), ExecutorConfig::default());

        executor.ask("count", image()).await.unwrap();
        executor.ask("count", image()).await.unwrap();

        let third = tokio::time::timeout(Duration::from_millis(100), executor.ask("count", image())).await;
        assert!(third.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_ask_times_out() {
        let provider = Arc::new(ScriptedProvider::new(["5"]).with_delay(Duration::from_millis(500)));
        let config = ExecutorConfig {
            timeout_ms: 20,
            ..Default::default()
        };
        let executor = Executor::new(provider, config);

        assert!(matches!(
            executor.ask("count", image()).await,
            Err(ProviderError::Timeout { timeout_ms: 20 })
        ));
    }
}
