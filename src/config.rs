//! Runtime configuration.
//!
//! Loaded from YAML (path in `CAREEROS_RESILIENCE_CONFIG`) or built in code,
//! then adjusted by environment overrides. The defaults carry the two caches
//! the application uses: AI responses (in memory, 7 days) and occupation
//! data (document store, 30 days).

use crate::cache::{
    CacheBackend, CacheConfig, CacheManager, DocumentCache, JsonFileDocumentStore, MemoryCache,
    NullCache,
};
use crate::call::ResilientCaller;
use crate::clock::{system_clock, Clock};
use crate::resilience::retry::RetryPolicy;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const AI_RESPONSE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const OCCUPATION_DATA_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub const ENV_CONFIG_PATH: &str = "CAREEROS_RESILIENCE_CONFIG";
pub const ENV_TIMEOUT_MS: &str = "CAREEROS_TIMEOUT_MS";
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "CAREEROS_RETRY_MAX_ATTEMPTS";
pub const ENV_DOCUMENT_STORE_DIR: &str = "CAREEROS_DOCUMENT_STORE_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Document,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub honor_retry_after: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            honor_retry_after: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: BackendKind,
    pub ttl_ms: u64,
    pub max_entries: usize,
    /// Chance that a write also sweeps expired entries.
    pub sweep_probability: f64,
    /// Document-store collection; defaults to the cache name.
    pub collection: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            ttl_ms: AI_RESPONSE_TTL.as_millis() as u64,
            max_entries: 1000,
            sweep_probability: 0.01,
            collection: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub timeout_ms: u64,
    pub retry: RetrySettings,
    pub caches: BTreeMap<String, CacheSettings>,
    pub document_store_dir: PathBuf,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        let mut caches = BTreeMap::new();
        caches.insert("ai".to_string(), CacheSettings::default());
        caches.insert(
            "onet".to_string(),
            CacheSettings {
                backend: BackendKind::Document,
                ttl_ms: OCCUPATION_DATA_TTL.as_millis() as u64,
                max_entries: 10_000,
                sweep_probability: 0.0,
                collection: Some("onet_cache".to_string()),
            },
        );
        Self {
            timeout_ms: 30_000,
            retry: RetrySettings::default(),
            caches,
            document_store_dir: PathBuf::from(".careeros-cache"),
        }
    }
}

impl ResilienceConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Defaults or the file named by `CAREEROS_RESILIENCE_CONFIG`, plus env overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = parse_env(ENV_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_RETRY_MAX_ATTEMPTS) {
            self.retry.max_attempts = parse_env(ENV_RETRY_MAX_ATTEMPTS, &v)?;
        }
        if let Some(v) = lookup(ENV_DOCUMENT_STORE_DIR) {
            self.document_store_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::configuration("timeout_ms must be greater than 0"));
        }
        self.retry_policy().validate()?;
        for (name, cache) in &self.caches {
            if cache.ttl_ms == 0 {
                return Err(config_error(name, "ttl_ms must be greater than 0"));
            }
            if !(0.0..=1.0).contains(&cache.sweep_probability) {
                return Err(config_error(name, "sweep_probability must be within [0, 1]"));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry.max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_backoff_multiplier(self.retry.backoff_multiplier)
            .with_retry_after_hints(self.retry.honor_retry_after)
    }

    pub fn cache(&self, name: &str) -> Result<&CacheSettings> {
        self.caches
            .get(name)
            .ok_or_else(|| config_error(name, "no such cache configured"))
    }

    pub fn build_cache_manager(&self, name: &str, clock: Arc<dyn Clock>) -> Result<CacheManager> {
        let settings = self.cache(name)?;
        let backend: Arc<dyn CacheBackend> = match settings.backend {
            BackendKind::Memory => Arc::new(MemoryCache::with_clock(settings.max_entries, clock)),
            BackendKind::Document => {
                let store = Arc::new(JsonFileDocumentStore::new(&self.document_store_dir));
                let collection = settings.collection.clone().unwrap_or_else(|| name.to_string());
                Arc::new(DocumentCache::with_clock(store, collection, clock))
            }
            BackendKind::Disabled => Arc::new(NullCache::new()),
        };
        let config = CacheConfig::new()
            .with_ttl(Duration::from_millis(settings.ttl_ms))
            .with_enabled(settings.backend != BackendKind::Disabled)
            .with_key_prefix(name)
            .with_sweep_probability(settings.sweep_probability);
        Ok(CacheManager::new(config, backend))
    }

    /// Composition-root helper: a caller owning the named cache.
    pub fn build_caller(&self, cache_name: &str) -> Result<ResilientCaller> {
        let cache = self.build_cache_manager(cache_name, system_clock())?;
        Ok(ResilientCaller::new(Arc::new(cache))
            .with_default_timeout(self.timeout())
            .with_default_retry(self.retry_policy()))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::configuration_with_context(
            format!("invalid value for {}", name),
            ErrorContext::new()
                .with_details(format!("value: {:?}", value))
                .with_source("env"),
        )
    })
}

fn config_error(cache: &str, msg: &str) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_details(format!("cache: {}", cache))
            .with_source("config"),
    )
}
