// src/provider/retry.rs — Bounded retry with fixed backoff for model providers
//
// A failed model call is retried only when ProbeError::is_retriable says so
// (rate limits and 5xx responses). Delays are fixed unless a backoff factor
// above 1.0 is configured; a provider's Retry-After hint always wins.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::config::RetrySettings;
use crate::infra::errors::ProbeError;

const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.1;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// 1.0 means every attempt waits `initial_delay`.
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.delay_ms),
            backoff_factor: settings.backoff_factor.max(1.0),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

/// A provider wrapper that retries `chat()` and `embed()` on transient errors.
pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    config: RetryConfig,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn ModelProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);
        Duration::from_millis((capped_ms * jitter) as u64)
    }

    /// Run `call` until it succeeds, fails with a non-retriable error, or the
    /// retry budget is spent. The last error is returned unchanged.
    async fn retrying<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, ProbeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProbeError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retriable() || attempt >= self.config.max_retries => return Err(e),
                Err(e) => e,
            };
            let delay = self.delay_for_attempt(attempt, rate_limit_delay(&error));
            tracing::warn!(
                provider = self.inner.id(),
                op,
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                %error,
                "transient provider failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn rate_limit_delay(error: &ProbeError) -> Option<Duration> {
    match error {
        ProbeError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Multiplier in [1 - fraction, 1 + fraction], derived from the attempt number.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProbeError> {
        self.retrying("chat", || self.inner.chat(request.clone())).await
    }

    async fn embed(&self, texts: &[&str], model: &str) -> Result<Vec<Vec<f32>>, ProbeError> {
        self.retrying("embed", || self.inner.embed(texts, model)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TokenUsage;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error `failures` times, then succeeds.
    struct FlakyProvider {
        failures: u32,
        retriable: bool,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn new(failures: u32, retriable: bool) -> Self {
            Self {
                failures,
                retriable,
                calls: AtomicU32::new(0),
            }
        }

        fn next(&self) -> Result<(), ProbeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ProbeError::Provider {
                    provider: "flaky".into(),
                    message: "HTTP 503".into(),
                    retriable: self.retriable,
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ModelProvider for FlakyProvider {
        fn id(&self) -> &str {
            "flaky"
        }
        fn name(&self) -> &str {
            "Flaky"
        }
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, ProbeError> {
            self.next()?;
            Ok(ChatResponse {
                content: "ok".into(),
                usage: TokenUsage::default(),
            })
        }
        async fn embed(&self, texts: &[&str], _model: &str) -> Result<Vec<Vec<f32>>, ProbeError> {
            self.next()?;
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
            jitter_fraction: 0.0,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let inner = Arc::new(FlakyProvider::new(2, true));
        let provider = RetryProvider::with_config(inner.clone(), fast_config(3));
        let resp = provider.chat(ChatRequest::single("m", "x")).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(FlakyProvider::new(10, true));
        let provider = RetryProvider::with_config(inner.clone(), fast_config(2));
        assert!(provider.chat(ChatRequest::single("m", "x")).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retriable_fails_immediately() {
        let inner = Arc::new(FlakyProvider::new(1, false));
        let provider = RetryProvider::with_config(inner.clone(), fast_config(3));
        assert!(provider.embed(&["a"], "m").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fixed_backoff_by_default() {
        let provider = RetryProvider::new(Arc::new(FlakyProvider::new(0, true)));
        for attempt in 0..4 {
            let d = provider.delay_for_attempt(attempt, None).as_millis();
            assert!((900..=1100).contains(&d), "attempt {attempt}: {d}ms");
        }
    }

    #[test]
    fn test_exponential_when_configured() {
        let settings = RetrySettings {
            max_retries: 3,
            delay_ms: 1_000,
            backoff_factor: 2.0,
        };
        let provider = RetryProvider::with_config(
            Arc::new(FlakyProvider::new(0, true)),
            RetryConfig::from(&settings),
        );
        let d2 = provider.delay_for_attempt(2, None).as_millis();
        assert!((3600..=4400).contains(&d2));
    }

    #[test]
    fn test_delay_uses_rate_limit_hint() {
        let provider = RetryProvider::new(Arc::new(FlakyProvider::new(0, true)));
        let d = provider.delay_for_attempt(0, Some(Duration::from_millis(10_000)));
        assert_eq!(d.as_millis(), 10_100);
    }

    #[test]
    fn test_rate_limit_delay_extraction() {
        let err = ProbeError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 3000,
        };
        assert_eq!(rate_limit_delay(&err), Some(Duration::from_millis(3000)));

        let zero = ProbeError::RateLimited {
            provider: "test".into(),
            retry_after_ms: 0,
        };
        assert!(rate_limit_delay(&zero).is_none());
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {j} out of range");
        }
        assert_eq!(deterministic_jitter(5, 0.2), deterministic_jitter(5, 0.2));
    }
}
