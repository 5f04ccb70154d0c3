//! services/cli/src/adapters/request_policy.rs
//!
//! Rate limiting and retry-with-backoff for calls to the language model.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use study_companion_core::ports::LlmError;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

//=========================================================================================
// Rate Limiting
//=========================================================================================

/// Enforces a minimum spacing between consecutive calls. Callers that come in
/// early wait; they never get an error.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Waits until the next call is allowed and claims the slot.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limit: waiting {:?} before the next call.", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

//=========================================================================================
// Retry Policy
//=========================================================================================

/// Bounds on how long and how often a call is attempted.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential part of the delay before retry number `retry` (0-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay)
    }

    /// Uniform random extra delay in `[0, base_delay)`.
    fn jitter(&self) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
    }
}

//=========================================================================================
// Request Policy
//=========================================================================================

/// Rate limiter and retry policy applied to every live call.
#[derive(Debug)]
pub struct RequestPolicy {
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl RequestPolicy {
    pub fn new(min_interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            limiter: RateLimiter::new(min_interval),
            retry,
        }
    }

    /// Runs `call` until it succeeds, fails with a non-transient error, or the
    /// retry budget is spent. Every attempt waits for the rate limiter and is
    /// bounded by the per-attempt timeout.
    pub async fn call_with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut retry = 0;
        loop {
            self.limiter.acquire().await;

            let outcome = match tokio::time::timeout(self.retry.attempt_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.retry.attempt_timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.backoff_delay(retry) + self.retry.jitter();
                    warn!(
                        "{} failed ({}); retry {}/{} in {:?}",
                        operation,
                        e,
                        retry + 1,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    error!("{} failed after {} attempt(s): {}", operation, retry + 1, e);
                    return Err(e);
                }
            }
        }
    }
}
