//! Cache manager.

use super::backend::{CacheBackend, CacheEntry};
use super::key::CacheKey;
use crate::Result;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
    pub max_entry_size: usize,
    pub key_prefix: Option<String>,
    /// Chance in `[0, 1]` that a `set` also sweeps expired entries.
    pub sweep_probability: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
            key_prefix: None,
            sweep_probability: 0.0,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_sweep_probability(mut self, p: f64) -> Self {
        self.sweep_probability = p;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub swept: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    swept: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Typed, TTL-aware front of a [`CacheBackend`].
///
/// Values are stored as JSON. A payload that no longer deserializes into the
/// requested type is reported as a miss.
pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    stats: Arc<AtomicStats>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: Arc::new(AtomicStats::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let prefixed = self.prefix_key(key);
        match self.backend.get(&prefixed).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(val) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(val))
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %prefixed, error = %e, "cached payload does not match requested type");
                    Ok(None)
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Raw entry lookup, exposing `stored_at` and TTL.
    pub async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        if !self.config.enabled {
            return Ok(None);
        }
        self.backend.entry(&self.prefix_key(key)).await
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.config.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let data = serde_json::to_vec(value)?;
        if data.len() > self.config.max_entry_size {
            debug!(size = data.len(), limit = self.config.max_entry_size, "skipping oversized cache entry");
            return Ok(());
        }
        let prefixed = self.prefix_key(key);
        if let Err(e) = self.backend.set(&prefixed, &data, ttl).await {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
        if self.roll_sweep() {
            self.sweep_expired().await?;
        }
        Ok(())
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        let deleted = self.backend.delete(&self.prefix_key(key)).await?;
        if deleted {
            self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(deleted)
    }

    /// Remove every expired entry. Correctness never depends on calling this.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let removed = self.backend.sweep_expired().await?;
        self.stats
            .swept
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            debug!(backend = self.backend.name(), removed, "swept expired cache entries");
        }
        Ok(removed)
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Sweep on a fixed interval until `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = manager.sweep_expired().await {
                            warn!(backend = manager.backend_name(), error = %e, "periodic cache sweep failed");
                        }
                    }
                }
            }
        })
    }

    fn roll_sweep(&self) -> bool {
        let p = self.config.sweep_probability;
        if p <= 0.0 || !p.is_finite() {
            return false;
        }
        rand::thread_rng().gen_bool(p.min(1.0))
    }

    fn prefix_key(&self, key: &CacheKey) -> CacheKey {
        match self.config.key_prefix {
            Some(ref p) => key.with_prefix(p),
            None => key.clone(),
        }
    }
}
