//! 调用入口：将缓存、超时、重试与回退组合为单一调用路径。
//!
//! Caller-facing entry point.
//!
//! [`ResilientCaller::call_with_resilience`] composes the layers around one
//! upstream operation:
//!
//! 1. cache lookup (when a key is given and the caller owns a cache)
//! 2. per-attempt timeout, with a fresh cancellation token per attempt
//! 3. retry with backoff for transient failures
//! 4. cache store of the successful value
//! 5. fallback when the path above fails
//!
//! Cache failures are logged and never fail the call. Fallback results are
//! not cached.

use crate::cache::{CacheKey, CacheManager};
use crate::context::CallContext;
use crate::resilience::fallback::{with_fallback, Fallback};
use crate::resilience::retry::{retry_with_backoff, RetryPolicy};
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CallOptions<T> {
    /// Per-attempt timeout; the caller's default when unset.
    pub timeout: Option<Duration>,
    /// Retry policy; the caller's default when unset.
    pub retry_policy: Option<RetryPolicy>,
    pub cache_key: Option<CacheKey>,
    /// TTL override for the stored value; the cache's default when unset.
    pub ttl: Option<Duration>,
    pub fallback: Option<Fallback<T>>,
}

impl<T> Default for CallOptions<T> {
    fn default() -> Self {
        Self {
            timeout: None,
            retry_policy: None,
            cache_key: None,
            ttl: None,
            fallback: None,
        }
    }
}

impl<T> CallOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<CacheKey>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback<T>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_fallback_value(self, value: T) -> Self {
        self.with_fallback(Fallback::value(value))
    }
}

/// Owns the process-wide cache and the default call policy.
///
/// Built once at the application's composition root and shared (e.g. in an
/// `Arc`) by every handler that reaches an upstream service.
pub struct ResilientCaller {
    cache: Option<Arc<CacheManager>>,
    default_timeout: Duration,
    default_retry: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            cache: Some(cache),
            default_timeout: DEFAULT_TIMEOUT,
            default_retry: RetryPolicy::default(),
        }
    }

    /// A caller that never caches.
    pub fn uncached() -> Self {
        Self {
            cache: None,
            default_timeout: DEFAULT_TIMEOUT,
            default_retry: RetryPolicy::default(),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    pub fn cache(&self) -> Option<&Arc<CacheManager>> {
        self.cache.as_ref()
    }

    /// Run `operation` behind cache, timeout, retry and fallback.
    ///
    /// With a fallback configured this only fails when the fallback operation
    /// fails or the retry policy is invalid. Without one, the final upstream
    /// error is returned so the caller can render a
    /// [`UserFacingError`](crate::UserFacingError).
    pub async fn call_with_resilience<T, F, Fut>(
        &self,
        ctx: &CallContext,
        options: CallOptions<T>,
        mut operation: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let CallOptions {
            timeout,
            retry_policy,
            cache_key,
            ttl,
            fallback,
        } = options;
        let timeout = timeout.unwrap_or(self.default_timeout);
        let policy = retry_policy.unwrap_or_else(|| self.default_retry.clone());
        policy.validate()?;

        let cached = match (&self.cache, cache_key) {
            (Some(cache), Some(key)) => Some((cache, key)),
            _ => None,
        };

        if let Some((cache, key)) = &cached {
            match cache.get::<T>(key).await {
                Ok(Some(value)) => {
                    debug!(operation = ctx.operation.as_str(), request_id = ctx.request_id.as_str(), key = %key, "cache hit");
                    return Ok(value);
                }
                Ok(None) => {
                    debug!(operation = ctx.operation.as_str(), request_id = ctx.request_id.as_str(), key = %key, "cache miss");
                }
                Err(e) => {
                    warn!(operation = ctx.operation.as_str(), request_id = ctx.request_id.as_str(), error = %e, "cache lookup failed; calling upstream");
                }
            }
        }

        let primary = async {
            let value = retry_with_backoff(&policy, ctx, || {
                let token = CancellationToken::new();
                let attempt = operation(token.clone());
                let on_timeout = Error::Timeout {
                    after: timeout,
                    context: ctx.error_context().with_source("timeout"),
                };
                crate::resilience::timeout::bounded(timeout, token, attempt, Some(on_timeout))
            })
            .await?;

            if let Some((cache, key)) = &cached {
                let stored = match ttl {
                    Some(ttl) => cache.set_with_ttl(key, &value, ttl).await,
                    None => cache.set(key, &value).await,
                };
                if let Err(e) = stored {
                    warn!(operation = ctx.operation.as_str(), request_id = ctx.request_id.as_str(), error = %e, "failed to store upstream result in cache");
                }
            }
            Ok::<T, Error>(value)
        };

        match fallback {
            Some(fallback) => with_fallback(ctx, primary, fallback).await,
            None => primary.await,
        }
    }
}
