//! # careeros-resilience
//!
//! 为 CareerOS 的上游调用（AI 分析、职业数据）提供缓存、超时、重试与降级回退。
//!
//! Response caching and call resilience for CareerOS upstream services
//! (AI analysis and occupation data).
//!
//! ## Overview
//!
//! Every slow or expensive upstream call goes through one composed path:
//! a TTL cache keyed by an order-insensitive digest of the inputs, a
//! per-attempt timeout, retry with capped exponential backoff for transient
//! failures, and a fallback that serves a degraded result instead of an
//! error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use careeros_resilience::cache::CacheKeyBuilder;
//! use careeros_resilience::config::ResilienceConfig;
//! use careeros_resilience::{CallContext, CallOptions};
//!
//! #[tokio::main]
//! async fn main() -> careeros_resilience::Result<()> {
//!     let caller = ResilienceConfig::from_env()?.build_caller("ai")?;
//!     let ctx = CallContext::new("transferable_skills").with_user_id("u-42");
//!     let key = CacheKeyBuilder::new()
//!         .namespace("transferable")
//!         .scalar("Analyst")
//!         .items(["SQL", "Python"])
//!         .build();
//!
//!     let skills: Vec<String> = caller
//!         .call_with_resilience(
//!             &ctx,
//!             CallOptions::new()
//!                 .with_cache_key(key)
//!                 .with_fallback_value(Vec::new()),
//!             |_cancel| async { Ok(vec!["sql".to_string()]) },
//!         )
//!         .await?;
//!     println!("{skills:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache, backends, key derivation, sweeps |
//! | [`resilience`] | Timeout, retry with backoff, fallback |
//! | [`call`] | The composed call path |
//! | [`upstream`] | Upstream error taxonomy, HTTP adapter, structured-output parsing |
//! | [`config`] | YAML and environment configuration |
//! | [`user_message`] | User-facing error text |

pub mod cache;
pub mod call;
pub mod clock;
pub mod config;
pub mod context;
pub mod error_code;
pub mod resilience;
pub mod upstream;
pub mod user_message;

pub use call::{CallOptions, ResilientCaller};
pub use context::CallContext;
pub use error_code::ErrorCode;
pub use resilience::{Fallback, RetryPolicy};
pub use user_message::UserFacingError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
