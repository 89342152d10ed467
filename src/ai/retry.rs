use super::config::{
    MIN_RETRY_MAX_TOKENS, MIN_RETRY_TEMPERATURE, SIMPLIFIED_MAX_MAX_TOKENS, SIMPLIFIED_MIN_MAX_TOKENS,
};
use super::validator::is_blank_completion;
use super::{
    CompletionRequest, CompletionTransport, GenerationConfig, GenerationError, RateLimiter,
    RawCompletion, UpstreamError,
};
use crate::utils::network_diagnostics::{log_retry_attempt, log_upstream_error};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Hard limit for a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: config.max_backoff(),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    /// Delay before retry number `attempt + 1`.
    ///
    /// `base * 2^attempt`, capped at `max_delay`, raised to any server `Retry-After`
    /// (also capped), plus `jitter * base` where `jitter` is in `[0, 1]`.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>, jitter: f64) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let exponential = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let floor = retry_after.map(|r| r.min(self.max_delay)).unwrap_or_default();
        let jitter = self.base_delay.mul_f64(jitter.clamp(0.0, 1.0));

        exponential.max(floor) + jitter
    }
}

/// Ease a request for the next attempt: fewer tokens, slightly cooler sampling.
pub fn ease_request(request: &mut CompletionRequest) {
    let scaled = request.max_tokens.saturating_mul(7) / 10;
    request.max_tokens = scaled.max(MIN_RETRY_MAX_TOKENS).min(request.max_tokens);

    if request.temperature > MIN_RETRY_TEMPERATURE {
        request.temperature = (request.temperature - 0.05).max(MIN_RETRY_TEMPERATURE);
    }
}

/// Wraps a single-attempt transport with spacing, per-attempt timeout and
/// exponential backoff.
pub struct RetryingTransport {
    inner: Arc<dyn CompletionTransport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(
        inner: Arc<dyn CompletionTransport>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            limiter,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn call(&self, request: &CompletionRequest) -> Result<RawCompletion, GenerationError> {
        self.call_observed(request, None, |_| {}).await
    }

    /// Like [`call`](Self::call), invoking `on_dispatch(attempt)` once per attempt
    /// when its rate-limiter slot is granted.
    ///
    /// A blank completion (empty, or nothing left after reasoning blocks) is
    /// answered within the same attempt by `simplified`, if given, with its token
    /// budget clamped to 80..=200 of the current one. If that is blank too the
    /// attempt counts as a server error.
    pub async fn call_observed<F>(
        &self,
        request: &CompletionRequest,
        simplified: Option<&CompletionRequest>,
        mut on_dispatch: F,
    ) -> Result<RawCompletion, GenerationError>
    where
        F: FnMut(u32) + Send,
    {
        let mut request = request.clone();
        let mut attempt: u32 = 0;

        loop {
            // Every attempt, retries included, goes through the limiter
            self.limiter.acquire().await;
            on_dispatch(attempt);

            let started = Instant::now();
            let mut outcome = self.dispatch(&request).await;

            let blank = matches!(&outcome, Ok(completion) if is_blank_completion(&completion.text));
            if let (true, Some(simplified)) = (blank, simplified) {
                log::warn!("Blank completion, sending simplified request");
                let mut follow_up = simplified.clone();
                follow_up.max_tokens = request
                    .max_tokens
                    .clamp(SIMPLIFIED_MIN_MAX_TOKENS, SIMPLIFIED_MAX_MAX_TOKENS);

                self.limiter.acquire().await;
                outcome = self.dispatch(&follow_up).await;
            }

            let error = match outcome {
                Ok(completion) if !is_blank_completion(&completion.text) => return Ok(completion),
                Ok(_) => UpstreamError::empty_completion(),
                Err(error) => error,
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            log_upstream_error(&error, Some(elapsed_ms));

            if !error.is_retryable() {
                return Err(GenerationError::Upstream(error));
            }

            if attempt >= self.policy.max_retries {
                log::error!(
                    "Upstream request failed after {} attempts: {}",
                    attempt + 1,
                    error
                );
                return Err(GenerationError::ExhaustedRetries {
                    attempts: attempt + 1,
                    last: error,
                });
            }

            let jitter: f64 = rand::thread_rng().gen_range(0.0..=1.0);
            let delay = self.policy.backoff_delay(attempt, error.retry_after, jitter);
            log_retry_attempt("chat_completion", attempt + 2, self.policy.max_retries + 1, delay);

            tokio::time::sleep(delay).await;
            attempt += 1;
            ease_request(&mut request);
        }
    }

    /// One upstream call bounded by the per-attempt timeout
    async fn dispatch(&self, request: &CompletionRequest) -> Result<RawCompletion, UpstreamError> {
        match tokio::time::timeout(self.policy.attempt_timeout, self.inner.complete(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(UpstreamError::timeout(self.policy.attempt_timeout)),
        }
    }
}
