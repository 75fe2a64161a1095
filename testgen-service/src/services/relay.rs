//! Generation relay: prompt construction, the upstream call with bounded
//! retry, and shaping of the model's answer.

use crate::config::{ModelConfig, RetryConfig};
use crate::models::ShapedResponse;
use crate::services::providers::{GenerationParams, ProviderError, TextProvider};
use backoff::future::retry_notify;
use backoff::ExponentialBackoffBuilder;
use service_core::error::AppError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const PROMPT_PREAMBLE: &str = "You are a code testing assistant with knowledge of all programming languages. \
Please generate test cases for the following code according to the latest industry standards. \
Generate the test cases with numbers as first test case and what does it do using minimal text. \
Your output will be displayed in a test case output window, so generate accordingly.";

const PROMPT_CLOSING: &str =
    "Provide the number of test cases possible followed by the test cases.";

/// Client-facing message for upstream failures; details stay in the logs.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "test case generation failed";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("upstream generation failed: {0}")]
    Upstream(ProviderError),

    #[error("upstream generation failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ProviderError },
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Upstream(_) => {
                AppError::BadGateway(UPSTREAM_FAILURE_MESSAGE.to_string())
            }
            GenerationError::RetriesExhausted { .. } => AppError::ServiceUnavailable,
        }
    }
}

/// Embed `payload` between the fixed instructions, set off by blank lines.
pub fn build_prompt(payload: &str) -> String {
    format!("{}\n\n{}\n\n{}", PROMPT_PREAMBLE, payload, PROMPT_CLOSING)
}

/// Stateless relay: every `generate` is one independent upstream request.
#[derive(Clone)]
pub struct GenerationRelay {
    provider: Arc<dyn TextProvider>,
    params: GenerationParams,
    retry: RetryConfig,
}

impl GenerationRelay {
    pub fn new(provider: Arc<dyn TextProvider>, models: &ModelConfig, retry: RetryConfig) -> Self {
        let params = GenerationParams {
            temperature: Some(models.temperature),
            top_p: Some(models.top_p),
            top_k: Some(models.top_k),
            max_tokens: Some(models.max_output_tokens),
            response_mime_type: Some("text/plain".to_string()),
        };

        Self {
            provider,
            params,
            retry,
        }
    }

    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    /// Prompt the model about `payload` and split its answer.
    pub async fn generate(&self, payload: &str) -> Result<ShapedResponse, GenerationError> {
        let prompt = build_prompt(payload);
        let raw = self.call_with_retry(&prompt).await?;
        Ok(ShapedResponse::from_raw(&raw))
    }

    async fn call_with_retry(&self, prompt: &str) -> Result<String, GenerationError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_backoff)
            .with_max_interval(self.retry.max_backoff)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let provider = self.provider.as_ref();
        let params = &self.params;
        let max_retries = self.retry.max_retries;

        let started = Instant::now();
        let result = retry_notify(
            policy,
            move || async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::counter!("testgen_upstream_attempts_total").increment(1);

                let call_started = Instant::now();
                let outcome = provider.generate(prompt, params).await;
                metrics::histogram!("testgen_provider_latency_seconds", "model" => provider.model().to_string())
                    .record(call_started.elapsed().as_secs_f64());

                match outcome {
                    Ok(response) => {
                        tracing::debug!(
                            attempt,
                            input_tokens = response.input_tokens,
                            output_tokens = response.output_tokens,
                            finish_reason = response.finish_reason.as_str(),
                            "Generation attempt succeeded"
                        );
                        Ok(response.text)
                    }
                    Err(e) if e.is_transient() && attempt <= max_retries => {
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            },
            |err: ProviderError, wait: Duration| {
                tracing::warn!(
                    error = %err,
                    kind = err.kind(),
                    backoff_ms = wait.as_millis() as u64,
                    "Generation attempt failed, retrying after backoff"
                );
            },
        )
        .await;

        let attempts = attempts.load(Ordering::SeqCst);

        match result {
            Ok(text) => {
                metrics::counter!("testgen_generations_total", "outcome" => "success").increment(1);
                tracing::info!(
                    model = %self.provider.model(),
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    response_len = text.len(),
                    "Generated test cases"
                );
                Ok(text)
            }
            Err(e) if e.is_transient() => {
                metrics::counter!("testgen_generations_total", "outcome" => "retries_exhausted")
                    .increment(1);
                tracing::error!(
                    error = %e,
                    kind = e.kind(),
                    attempts,
                    "Generation failed after max retries"
                );
                Err(GenerationError::RetriesExhausted { attempts, last: e })
            }
            Err(e) => {
                metrics::counter!("testgen_generations_total", "outcome" => "upstream_error")
                    .increment(1);
                tracing::error!(
                    error = %e,
                    kind = e.kind(),
                    attempts,
                    "Generation failed with permanent error, not retrying"
                );
                Err(GenerationError::Upstream(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::{MockReply, MockTextProvider};

    fn models() -> ModelConfig {
        ModelConfig {
            text_model: "mock".to_string(),
            api_base: "http://unused".to_string(),
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 500,
        }
    }

    fn quick_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            request_timeout: Duration::from_secs(1),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    fn relay(provider: Arc<MockTextProvider>, max_retries: u32) -> GenerationRelay {
        GenerationRelay::new(provider, &models(), quick_retry(max_retries))
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("def add(a, b): return a + b");
        let blocks: Vec<&str> = prompt.split("\n\n").collect();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], PROMPT_PREAMBLE);
        assert_eq!(blocks[1], "def add(a, b): return a + b");
        assert_eq!(blocks[2], PROMPT_CLOSING);
    }

    #[test]
    fn test_prompt_keeps_payload_verbatim() {
        let payload = "  fn main() {\n\tprintln!(\"hi\");\n}\n";
        let prompt = build_prompt(payload);
        assert!(prompt.contains(payload));
        assert!(prompt.starts_with(PROMPT_PREAMBLE));
        assert!(prompt.ends_with(PROMPT_CLOSING));
    }

    #[tokio::test]
    async fn test_generate_shapes_response() {
        let provider = Arc::new(MockTextProvider::replying(
            "3 test cases found\nTest 1...\nTest 2...\nTest 3...",
        ));
        let shaped = relay(provider.clone(), 0)
            .generate("def add(a, b): return a + b")
            .await
            .unwrap();

        assert_eq!(shaped.num_test_cases, "3 test cases found");
        assert_eq!(shaped.test_cases, "Test 1...\nTest 2...\nTest 3...");
        assert_eq!(provider.call_count(), 1);
        assert!(provider.prompts()[0].contains("def add(a, b): return a + b"));
    }

    #[tokio::test]
    async fn test_each_call_is_independent() {
        let provider = Arc::new(MockTextProvider::replying("1\nT"));
        let relay = relay(provider.clone(), 0);

        relay.generate("first()").await.unwrap();
        relay.generate("second()").await.unwrap();

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[1].contains("first()"));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let provider = Arc::new(MockTextProvider::scripted(
            vec![
                MockReply::Fail(ProviderError::RateLimited),
                MockReply::Fail(ProviderError::ServerError("503".to_string())),
            ],
            MockReply::Text("2 cases\nA\nB".to_string()),
        ));

        let shaped = relay(provider.clone(), 2).generate("x").await.unwrap();
        assert_eq!(shaped.num_test_cases, "2 cases");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let provider = Arc::new(MockTextProvider::failing(ProviderError::Timeout));

        let err = relay(provider.clone(), 2).generate("x").await.unwrap_err();
        match err {
            GenerationError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, ProviderError::Timeout);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let provider = Arc::new(MockTextProvider::failing(ProviderError::ApiError(
            "400 bad key".to_string(),
        )));

        let err = relay(provider.clone(), 3).generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Upstream(ProviderError::ApiError(_))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let provider = Arc::new(MockTextProvider::failing(ProviderError::NetworkError(
            "connection reset".to_string(),
        )));

        let err = relay(provider.clone(), 0).generate("x").await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::RetriesExhausted { attempts: 1, .. }
        ));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_error_mapping() {
        let app: AppError = GenerationError::Upstream(ProviderError::ContentFiltered).into();
        assert!(matches!(app, AppError::BadGateway(ref m) if m == UPSTREAM_FAILURE_MESSAGE));

        let app: AppError = GenerationError::RetriesExhausted {
            attempts: 3,
            last: ProviderError::RateLimited,
        }
        .into();
        assert!(matches!(app, AppError::ServiceUnavailable));
    }
}
