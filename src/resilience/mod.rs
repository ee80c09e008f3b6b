//! 弹性模式模块：超时、指数退避重试与降级回退。
//!
//! # Resilience Primitives Module
//!
//! The wrappers that compose around a single upstream call, innermost first:
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`timeout`] | Bound the caller's wait for one attempt; cancel the attempt's token on expiry |
//! | [`retry`] | Re-attempt transient failures with capped exponential backoff |
//! | [`fallback`] | Replace a failed result with a degraded value or computation |
//!
//! ```rust
//! use careeros_resilience::resilience::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .with_max_attempts(4)
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_max_delay(Duration::from_millis(300));
//! assert_eq!(
//!     policy.schedule(),
//!     vec![
//!         Duration::from_millis(100),
//!         Duration::from_millis(200),
//!         Duration::from_millis(300),
//!     ]
//! );
//! ```

pub mod fallback;
pub mod retry;
pub mod timeout;

pub use fallback::{with_fallback, Fallback};
pub use retry::{default_classifier, retry_with_backoff, ResiliencePolicy, RetryPolicy};
pub use timeout::{with_timeout, with_timeout_or};
