//! Cache backend implementations.

use super::key::CacheKey;
use crate::clock::{system_clock, Clock};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// TTL in whole milliseconds, saturating for durations past `u64::MAX` ms.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub data: Vec<u8>,
    pub stored_at_ms: u64,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(data: Vec<u8>, stored_at_ms: u64, ttl: Duration) -> Self {
        Self {
            data,
            stored_at_ms,
            ttl,
        }
    }

    /// An entry is valid while `now - stored_at < ttl`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) >= ttl_millis(self.ttl)
    }

    pub fn expires_at_ms(&self) -> u64 {
        self.stored_at_ms.saturating_add(ttl_millis(self.ttl))
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Return the payload only if the entry is unexpired.
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    /// Return the full unexpired entry, including its timestamps.
    async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;
    /// Insert or overwrite; resets `stored_at` to now.
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    /// Delete every expired entry and return how many were removed.
    async fn sweep_expired(&self) -> Result<usize>;
    async fn clear(&self) -> Result<()>;
    /// Number of unexpired entries.
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// Bounded in-memory store.
///
/// - Expired entries are dropped lazily on access and by `sweep_expired`
/// - Past `max_entries`, the oldest entry is evicted to make room
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, system_clock())
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries.lock().map_err(|_| {
            Error::store_with_context(
                "memory cache poisoned",
                ErrorContext::new().with_source("memory_cache"),
            )
        })
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, CacheEntry>, now_ms: u64) {
        entries.retain(|_, e| !e.is_expired(now_ms));
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at_ms)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entry(key).await?.map(|e| e.data))
    }

    async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let now = self.clock.now_ms();
        let mut entries = self.lock()?;
        let expired = match entries.get(key.as_str()) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key.as_str());
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let now = self.clock.now_ms();
        let mut entries = self.lock()?;
        if !entries.contains_key(key.as_str()) {
            self.evict_if_needed(&mut entries, now);
        }
        entries.insert(
            key.as_str().to_string(),
            CacheEntry::new(value.to_vec(), now, ttl),
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.remove(key.as_str()).is_some())
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(before - entries.len())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        Ok(self
            .lock()?
            .values()
            .filter(|e| !e.is_expired(now))
            .count())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// No-op backend; every lookup misses.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn entry(&self, _: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn sweep_expired(&self) -> Result<usize> {
        Ok(0)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
