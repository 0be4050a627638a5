//! Retry provider - decorator that adds automatic retry with exponential backoff.
//!
//! Wraps any [`LLMProvider`] and retries errors classified as transient
//! (rate limit, 5xx, timeout). Anything else is returned on the first failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use aptoclaw::providers::{OpenAIProvider, RetryProvider};
//!
//! let inner = OpenAIProvider::new("api-key", "gpt-4-turbo");
//! let provider = RetryProvider::new(Box::new(inner))
//!     .with_max_retries(3)
//!     .with_base_delay_ms(500);
//! ```

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{AptoError, Result};
use crate::session::Message;

use super::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};

/// Provider wrapper that retries transient failures.
pub struct RetryProvider {
    inner: Box<dyn LLMProvider>,
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .finish()
    }
}

impl RetryProvider {
    pub fn new(inner: Box<dyn LLMProvider>) -> Self {
        let defaults = RetryConfig::default();
        Self {
            inner,
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay_ms,
            max_delay_ms: defaults.max_delay_ms,
        }
    }

    pub fn from_config(inner: Box<dyn LLMProvider>, config: &RetryConfig) -> Self {
        Self::new(inner)
            .with_max_retries(config.max_retries)
            .with_base_delay_ms(config.base_delay_ms)
            .with_max_delay_ms(config.max_delay_ms)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

/// Only classified provider errors are retried.
pub fn is_retryable(err: &AptoError) -> bool {
    match err {
        AptoError::ProviderTyped(pe) => pe.is_retryable(),
        _ => false,
    }
}

/// Backoff for the given zero-based retry: `base * 2^attempt + jitter`, capped.
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    exponential.saturating_add(jitter_ms).min(max_delay_ms)
}

async fn delay_with_jitter(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) {
    let jitter_ms = rand::thread_rng().gen_range(0..base_delay_ms.max(1));
    let delay = compute_delay(attempt, base_delay_ms, max_delay_ms, jitter_ms);
    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
}

#[async_trait]
impl LLMProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let mut attempt = 0;
        loop {
            match self
                .inner
                .chat(messages.clone(), tools.clone(), model, options.clone())
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if is_retryable(&err) && attempt < self.max_retries => {
                    warn!(
                        provider = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %err,
                        "Retrying chat request after transient error"
                    );
                    delay_with_jitter(attempt, self.base_delay_ms, self.max_delay_ms).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails with the given error `failures` times, then answers.
    struct FlakyProvider {
        calls: Arc<AtomicU32>,
        failures: u32,
        make_error: fn() -> AptoError,
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn default_model(&self) -> &str {
            "flaky-1"
        }

        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.make_error)())
            } else {
                Ok(LLMResponse::text("ok"))
            }
        }
    }

    fn flaky(failures: u32, make_error: fn() -> AptoError) -> (RetryProvider, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = FlakyProvider {
            calls: calls.clone(),
            failures,
            make_error,
        };
        let provider = RetryProvider::new(Box::new(inner))
            .with_max_retries(2)
            .with_base_delay_ms(1)
            .with_max_delay_ms(5);
        (provider, calls)
    }

    async fn ask(provider: &RetryProvider) -> Result<LLMResponse> {
        provider
            .chat(vec![Message::user("hi")], vec![], None, ChatOptions::default())
            .await
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let (provider, calls) = flaky(2, || ProviderError::RateLimit("429".into()).into());
        let response = ask(&provider).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (provider, calls) = flaky(10, || ProviderError::ServerError("502".into()).into());
        assert!(ask(&provider).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_auth() {
        let (provider, calls) = flaky(10, || ProviderError::Auth("bad key".into()).into());
        assert!(ask(&provider).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unclassified_errors_not_retried() {
        let (provider, calls) = flaky(10, || AptoError::Provider("500 internal".into()));
        assert!(ask(&provider).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_compute_delay() {
        assert_eq!(compute_delay(0, 1000, 10_000, 0), 1000);
        assert_eq!(compute_delay(1, 1000, 10_000, 0), 2000);
        assert_eq!(compute_delay(3, 1000, 10_000, 0), 8000);
        assert_eq!(compute_delay(4, 1000, 10_000, 0), 10_000);
        assert_eq!(compute_delay(0, 1000, 10_000, 250), 1250);
        assert_eq!(compute_delay(40, u64::MAX, u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_delegates_identity() {
        let (provider, _) = flaky(0, || AptoError::Provider("x".into()));
        assert_eq!(provider.name(), "flaky");
        assert_eq!(provider.default_model(), "flaky-1");
        assert!(format!("{:?}", provider).contains("max_retries: 2"));
    }
}
