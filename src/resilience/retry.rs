//! Retry with exponential backoff.
//!
//! `Attempting(n)` either succeeds, fails permanently (non-retryable error or
//! attempts exhausted, returning the last error), or sleeps for the backoff
//! delay and moves on to `Attempting(n + 1)`.

use crate::context::CallContext;
use crate::{Error, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub type RetryClassifier = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Default classifier: retry only errors whose code is transient.
pub fn default_classifier(err: &Error) -> bool {
    err.is_retryable()
}

#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Lengthen a delay to an upstream `Retry-After` hint. Off by default.
    pub honor_retry_after: bool,
    classifier: RetryClassifier,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("honor_retry_after", &self.honor_retry_after)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            honor_retry_after: false,
            classifier: Arc::new(default_classifier),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, never retried.
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Let `Retry-After` hints stretch the computed delay, up to `max_delay`.
    pub fn with_retry_after_hints(mut self, enabled: bool) -> Self {
        self.honor_retry_after = enabled;
        self
    }

    /// Replace the `should_retry` classification.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::configuration("retry.max_attempts must be at least 1"));
        }
        if self.initial_delay > self.max_delay {
            return Err(Error::configuration(
                "retry.initial_delay must not exceed retry.max_delay",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::configuration(
                "retry.backoff_multiplier must be a finite number >= 1",
            ));
        }
        Ok(())
    }

    pub fn should_retry(&self, err: &Error) -> bool {
        (self.classifier)(err)
    }

    /// Delay after failed attempt `attempt` (1-based):
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exp);
        let cap = self.max_delay.as_nanos() as f64;
        if !nanos.is_finite() || nanos >= cap {
            self.max_delay
        } else {
            Duration::from_nanos(nanos.round() as u64)
        }
    }

    /// The full sequence of delays a call that keeps failing would observe.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|n| self.delay_for_attempt(n))
            .collect()
    }
}

/// Decides whether and when to retry after a failed attempt.
pub trait ResiliencePolicy: Send + Sync {
    /// `attempt` is 1-based: the number of the attempt that just failed.
    fn next_delay(&self, attempt: u32, error: &Error) -> Option<Duration>;
}

impl ResiliencePolicy for RetryPolicy {
    fn next_delay(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if attempt >= self.max_attempts || !self.should_retry(error) {
            return None;
        }
        let computed = self.delay_for_attempt(attempt);
        let delay = match error.retry_after() {
            Some(hint) if self.honor_retry_after => hint.min(self.max_delay).max(computed),
            _ => computed,
        };
        Some(delay)
    }
}

/// Invoke `op` until it succeeds, fails permanently, or attempts run out.
///
/// On exhaustion the error of the final attempt is returned.
pub async fn retry_with_backoff<T, P, F, Fut>(policy: &P, ctx: &CallContext, mut op: F) -> Result<T>
where
    P: ResiliencePolicy + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = ctx.operation.as_str(),
                        request_id = ctx.request_id.as_str(),
                        attempt,
                        "upstream call recovered after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => match policy.next_delay(attempt, &err) {
                Some(delay) => {
                    warn!(
                        operation = ctx.operation.as_str(),
                        request_id = ctx.request_id.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error_code = err.code().code(),
                        error = %err,
                        "upstream call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    debug!(
                        operation = ctx.operation.as_str(),
                        request_id = ctx.request_id.as_str(),
                        attempt,
                        error_code = err.code().code(),
                        "giving up on upstream call"
                    );
                    return Err(err);
                }
            },
        }
    }
}
