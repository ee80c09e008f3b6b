//! 响应缓存模块：带 TTL 的可插拔缓存后端，用于屏蔽缓慢或昂贵的上游调用。
//!
//! # Response Caching Module
//!
//! TTL-based caching of upstream results (AI analyses, occupation data) with
//! pluggable backends.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Typed get/set, statistics, randomized and periodic sweeps |
//! | [`CacheConfig`] | Default TTL, enable switch, key prefix, sweep probability |
//! | [`CacheBackend`] | Trait for storage media |
//! | [`MemoryCache`] | Bounded in-process store |
//! | [`DocumentCache`] | Store backed by a [`DocumentStore`] collection, durable across restarts |
//! | [`NullCache`] | No-op cache for disabling caching |
//! | [`CacheKeyBuilder`] | Order-insensitive key derivation |
//!
//! ## Example
//!
//! ```rust
//! use careeros_resilience::cache::{CacheConfig, CacheKeyBuilder, CacheManager, MemoryCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> careeros_resilience::Result<()> {
//! let cache = CacheManager::new(
//!     CacheConfig::new().with_ttl(Duration::from_secs(7 * 24 * 3600)),
//!     Arc::new(MemoryCache::new(1000)),
//! );
//! let key = CacheKeyBuilder::new()
//!     .scalar("Analyst")
//!     .items(["SQL", "python"])
//!     .build();
//! cache.set(&key, &"ranked skills").await?;
//! assert_eq!(cache.get::<String>(&key).await?.as_deref(), Some("ranked skills"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Expiry
//!
//! An entry is served only while `now - stored_at < ttl`. Expired entries are
//! removed on access; sweeps only reclaim memory.

mod backend;
mod document;
mod key;
mod manager;

pub use backend::{CacheBackend, CacheEntry, MemoryCache, NullCache};
pub use document::{
    DocumentCache, DocumentRecord, DocumentStore, InMemoryDocumentStore, JsonFileDocumentStore,
};
pub use key::{CacheKey, CacheKeyBuilder, ITEM_DELIMITER, SEGMENT_DELIMITER};
pub use manager::{CacheConfig, CacheManager, CacheStats};
