//! Bounded retry around a model backend.
//!
//! Transient failures are retried with exponential backoff and jitter. Rate-limited requests are retried on the fallback model tier.
//! Every completed call emits one usage event; telemetry never affects
//! control flow.

use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{
    LlmError, LlmPort, LlmRequest, LlmResponse, ModelTier, TextStream,
};

/// Bounded retry policy for model calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff sleep
    pub max_delay_ms: u64,
    /// Fraction of the delay added or removed at random (0.0-1.0)
    pub jitter_factor: f64,
    /// Retry rate-limited requests on the fallback model tier
    pub downgrade_on_rate_limit: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
            downgrade_on_rate_limit: true,
        }
    }
}

/// An [`LlmPort`] that retries transient failures of the wrapped backend.
pub struct ResilientLlmClient {
    inner: Arc<dyn LlmPort>,
    config: RetryConfig,
}

impl ResilientLlmClient {
    pub fn new(inner: Arc<dyn LlmPort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Sleep before retry number `retry` (1-based): `base * 2^(retry-1)`,
    /// capped, then jittered.
    fn backoff_delay(&self, retry: u32) -> u64 {
        let doubled = 2u64.saturating_pow(retry.saturating_sub(1));
        let delay = self
            .config
            .base_delay_ms
            .saturating_mul(doubled)
            .min(self.config.max_delay_ms);

        let spread = (delay as f64 * self.config.jitter_factor) as i64;
        if spread <= 0 {
            return delay;
        }
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        (delay as i64 + offset).max(0) as u64
    }

    fn should_retry(error: &LlmError) -> bool {
        match error {
            LlmError::RateLimited(_) => true,
            // Client errors will fail the same way again
            LlmError::RequestFailed(msg) => !["HTTP 400", "HTTP 401", "HTTP 403", "HTTP 404"]
                .iter()
                .any(|status| msg.contains(status)),
            LlmError::SafetyRejected { .. } | LlmError::BadResponse(_) => false,
        }
    }

    /// Run `call` until it succeeds, fails permanently, or the retry budget
    /// is spent. Returns the request as finally sent, so callers can report
    /// the tier that answered.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut request: LlmRequest,
        call: F,
    ) -> Result<(T, LlmRequest), LlmError>
    where
        F: Fn(LlmRequest) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut retries = 0u32;
        loop {
            let error = match call(request.clone()).await {
                Ok(value) => {
                    if retries > 0 {
                        tracing::info!(operation, retries, tier = ?request.tier, "LLM call recovered");
                    }
                    return Ok((value, request));
                }
                Err(error) => error,
            };

            if !Self::should_retry(&error) {
                tracing::error!(operation, %error, "LLM call failed permanently");
                return Err(error);
            }
            if retries >= self.config.max_retries {
                tracing::error!(operation, attempts = retries + 1, %error, "LLM retry budget exhausted");
                return Err(error);
            }

            retries += 1;
            if error.is_rate_limited() && self.config.downgrade_on_rate_limit {
                request.tier = ModelTier::Fallback;
            }
            let delay_ms = self.backoff_delay(retries);
            tracing::warn!(
                operation,
                retry = retries,
                max_retries = self.config.max_retries,
                delay_ms,
                tier = ?request.tier,
                %error,
                "LLM call failed, backing off"
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

#[async_trait]
impl LlmPort for ResilientLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let prompt_chars = request.prompt_chars();
        let inner = Arc::clone(&self.inner);
        let (response, sent) = self
            .with_retry("generate", request, |request| {
                let inner = Arc::clone(&inner);
                async move { inner.generate(request).await }
            })
            .await?;

        tracing::info!(
            operation = "generate",
            tier = ?sent.tier,
            prompt_chars,
            response_chars = response.content.len(),
            prompt_tokens = response.usage.map(|u| u.prompt_tokens),
            completion_tokens = response.usage.map(|u| u.completion_tokens),
            "LLM usage"
        );
        Ok(response)
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream, LlmError> {
        let prompt_chars = request.prompt_chars();
        let inner = Arc::clone(&self.inner);
        // Only opening the stream is retried; a stream that fails midway is
        // not restartable.
        let (stream, sent) = self
            .with_retry("generate_stream", request, |request| {
                let inner = Arc::clone(&inner);
                async move { inner.generate_stream(request).await }
            })
            .await?;

        let mut usage = StreamUsage {
            tier: sent.tier,
            prompt_chars,
            response_chars: 0,
        };
        let stream = stream
            .map(move |chunk| {
                if let Ok(text) = &chunk {
                    usage.record(text.len());
                }
                chunk
            })
            .boxed();
        Ok(stream)
    }
}

/// Character tally of a streamed response, reported when the stream is
/// finished or dropped.
struct StreamUsage {
    tier: ModelTier,
    prompt_chars: usize,
    response_chars: usize,
}

impl StreamUsage {
    fn record(&mut self, chars: usize) {
        self.response_chars += chars;
    }
}

impl Drop for StreamUsage {
    fn drop(&mut self) {
        tracing::info!(
            operation = "generate_stream",
            tier = ?self.tier,
            prompt_chars = self.prompt_chars,
            response_chars = self.response_chars,
            "LLM usage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::MockLlmPort;
    use futures_util::stream;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Fails with `error` for the first `failures` calls, then answers.
    struct FlakyLlm {
        failures: AtomicU32,
        error: LlmError,
        tiers_seen: Mutex<Vec<ModelTier>>,
    }

    impl FlakyLlm {
        fn new(failures: u32, error: LlmError) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                error,
                tiers_seen: Mutex::new(Vec::new()),
            }
        }

        fn attempt(&self, request: &LlmRequest) -> Result<(), LlmError> {
            self.tiers_seen.lock().unwrap().push(request.tier);
            match self.failures.load(Ordering::SeqCst) {
                0 => Ok(()),
                left => {
                    self.failures.store(left - 1, Ordering::SeqCst);
                    Err(self.error.clone())
                }
            }
        }
    }

    #[async_trait]
    impl LlmPort for FlakyLlm {
        async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
            self.attempt(&request)?;
            Ok(LlmResponse::text("Success!"))
        }

        async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream, LlmError> {
            self.attempt(&request)?;
            Ok(stream::iter(vec![Ok("Suc".to_string()), Ok("cess!".to_string())]).boxed())
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter_factor: 0.0,
            downgrade_on_rate_limit: true,
        }
    }

    #[tokio::test]
    async fn first_success_is_returned() {
        let mock = Arc::new(FlakyLlm::new(0, LlmError::request_failed("test")));
        let client = ResilientLlmClient::new(mock, RetryConfig::default());

        let result = client.generate(LlmRequest::prompt("hi")).await;

        assert_eq!(result.unwrap().content, "Success!");
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let mock = Arc::new(FlakyLlm::new(2, LlmError::request_failed("transient")));
        let client = ResilientLlmClient::new(mock, fast_config(3));

        let result = client.generate(LlmRequest::prompt("hi")).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let mock = Arc::new(FlakyLlm::new(10, LlmError::rate_limited("HTTP 429")));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(2));

        let result = client.generate(LlmRequest::prompt("hi")).await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(mock_ref.tiers_seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rate_limit_downgrades_to_fallback_tier() {
        let mock = Arc::new(FlakyLlm::new(1, LlmError::rate_limited("HTTP 429")));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        client.generate(LlmRequest::prompt("hi")).await.unwrap();

        assert_eq!(
            *mock_ref.tiers_seen.lock().unwrap(),
            vec![ModelTier::Primary, ModelTier::Fallback]
        );
    }

    #[tokio::test]
    async fn transient_failure_keeps_primary_tier() {
        let mock = Arc::new(FlakyLlm::new(1, LlmError::request_failed("HTTP 503: busy")));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        client.generate(LlmRequest::prompt("hi")).await.unwrap();

        assert_eq!(
            *mock_ref.tiers_seen.lock().unwrap(),
            vec![ModelTier::Primary, ModelTier::Primary]
        );
    }

    #[tokio::test]
    async fn auth_error_is_not_retried() {
        let mock = Arc::new(FlakyLlm::new(10, LlmError::request_failed("HTTP 401: Unauthorized")));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        let result = client.generate(LlmRequest::prompt("hi")).await;

        assert!(result.is_err());
        assert_eq!(mock_ref.failures.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn safety_rejection_is_not_retried() {
        let mut mock = MockLlmPort::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Err(LlmError::safety_rejected(["harassment"])));
        let client = ResilientLlmClient::new(Arc::new(mock), fast_config(3));

        let err = client.generate(LlmRequest::prompt("hi")).await.unwrap_err();

        assert!(err.is_safety_rejection());
    }

    #[tokio::test]
    async fn stream_open_is_retried_and_chunks_pass_through() {
        let mock = Arc::new(FlakyLlm::new(1, LlmError::rate_limited("HTTP 429")));
        let client = ResilientLlmClient::new(mock, fast_config(2));

        let stream = client.generate_stream(LlmRequest::prompt("hi")).await.unwrap();
        let chunks: Vec<_> = stream.collect().await;

        assert_eq!(chunks, vec![Ok("Suc".to_string()), Ok("cess!".to_string())]);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        let client = ResilientLlmClient::new(
            Arc::new(FlakyLlm::new(0, LlmError::request_failed(""))),
            config,
        );

        let delays: Vec<u64> = (1..=6).map(|retry| client.backoff_delay(retry)).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30_000]);
    }

    #[test]
    fn jitter_stays_within_the_spread() {
        let client = ResilientLlmClient::new(
            Arc::new(FlakyLlm::new(0, LlmError::request_failed(""))),
            RetryConfig::default(),
        );

        for _ in 0..50 {
            let delay = client.backoff_delay(2);
            assert!((1600..=2400).contains(&delay), "delay {delay} out of range");
        }
    }

    #[tokio::test]
    async fn stream_usage_is_logged_once_the_stream_is_consumed() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock = MockLlmPort::new();
        mock.expect_generate_stream().returning(|_| {
            Ok(stream::iter(vec![Ok("hello".to_string()), Ok("world".to_string())]).boxed())
        });
        let client = ResilientLlmClient::new(Arc::new(mock), fast_config(0));

        let stream = client.generate_stream(LlmRequest::prompt("hi")).await.unwrap();
        assert!(!logs.contents().contains("LLM usage"));

        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 2);

        let output = logs.contents();
        assert_eq!(output.matches("LLM usage").count(), 1);
        assert!(output.contains("response_chars=10"), "{output}");
    }
}
