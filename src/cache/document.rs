//! Document-store backed cache.
//!
//! The persistent variant of the TTL store: records live in named collections
//! of an external document store and survive process restarts. Expiry is
//! stored on each record so `delete_expired` needs no TTL knowledge.

use super::backend::{ttl_millis, CacheBackend, CacheEntry};
use super::key::CacheKey;
use crate::clock::{system_clock, Clock};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub key: String,
    pub payload: serde_json::Value,
    pub stored_at_ms: u64,
    pub expires_at_ms: u64,
}

impl DocumentRecord {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<DocumentRecord>>;
    async fn put(&self, collection: &str, key: &str, record: DocumentRecord) -> Result<()>;
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;
    /// Delete `key` only if its record still carries `stored_at_ms`, so a
    /// concurrent refresh is never lost.
    async fn delete_if_unchanged(
        &self,
        collection: &str,
        key: &str,
        stored_at_ms: u64,
    ) -> Result<bool>;
    /// Delete records whose expiry is at or before `now_ms`.
    async fn delete_expired(&self, collection: &str, now_ms: u64) -> Result<usize>;
    async fn count(&self, collection: &str) -> Result<usize>;
    /// Records still valid at `now_ms`.
    async fn count_unexpired(&self, collection: &str, now_ms: u64) -> Result<usize>;
    async fn clear(&self, collection: &str) -> Result<()>;
    async fn collections(&self) -> Result<Vec<String>>;
}

/// Process-local document store. Useful in tests and single-node setups.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<String, DocumentRecord>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<DocumentRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, record: DocumentRecord) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        Ok(self
            .collections
            .write()
            .await
            .get_mut(collection)
            .map(|c| c.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn delete_if_unchanged(
        &self,
        collection: &str,
        key: &str,
        stored_at_ms: u64,
    ) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(false);
        };
        if records.get(key).map(|r| r.stored_at_ms) != Some(stored_at_ms) {
            return Ok(false);
        }
        Ok(records.remove(key).is_some())
    }

    async fn delete_expired(&self, collection: &str, now_ms: u64) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now_ms));
        Ok(before - records.len())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0))
    }

    async fn count_unexpired(&self, collection: &str, now_ms: u64) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.values().filter(|r| !r.is_expired(now_ms)).count())
            .unwrap_or(0))
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Durable store keeping one JSON file per collection under a directory.
///
/// Writes go to a temporary file that is renamed over the collection file,
/// so a crash never leaves a half-written collection behind.
pub struct JsonFileDocumentStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

type Collection = BTreeMap<String, DocumentRecord>;

impl JsonFileDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::configuration_with_context(
                "invalid collection name",
                ErrorContext::new()
                    .with_details(format!("collection: {:?}", collection))
                    .with_source("json_file_store"),
            ));
        }
        Ok(self.dir.join(format!("{}.json", collection)))
    }

    async fn load(&self, collection: &str) -> Result<Collection> {
        let path = self.collection_path(collection)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Collection::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::store_with_context(
                    format!("corrupt collection file: {}", e),
                    ErrorContext::new()
                        .with_details(path.display().to_string())
                        .with_source("json_file_store"),
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Collection::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, collection: &str, records: &Collection) -> Result<()> {
        let path = self.collection_path(collection)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.load(collection).await?.remove(key))
    }

    async fn put(&self, collection: &str, key: &str, record: DocumentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(collection).await?;
        records.insert(key.to_string(), record);
        self.save(collection, &records).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(collection).await?;
        let removed = records.remove(key).is_some();
        if removed {
            self.save(collection, &records).await?;
        }
        Ok(removed)
    }

    async fn delete_if_unchanged(
        &self,
        collection: &str,
        key: &str,
        stored_at_ms: u64,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(collection).await?;
        if records.get(key).map(|r| r.stored_at_ms) != Some(stored_at_ms) {
            return Ok(false);
        }
        records.remove(key);
        self.save(collection, &records).await?;
        Ok(true)
    }

    async fn delete_expired(&self, collection: &str, now_ms: u64) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load(collection).await?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now_ms));
        let removed = before - records.len();
        if removed > 0 {
            self.save(collection, &records).await?;
        }
        debug!(collection, removed, "swept expired documents");
        Ok(removed)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.load(collection).await?.len())
    }

    async fn count_unexpired(&self, collection: &str, now_ms: u64) -> Result<usize> {
        Ok(self
            .load(collection)
            .await?
            .values()
            .filter(|r| !r.is_expired(now_ms))
            .count())
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.collection_path(collection)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// [`CacheBackend`] over one collection of a [`DocumentStore`].
///
/// Record ids are the SHA-256 digest of the cache key; payloads must be JSON.
pub struct DocumentCache {
    store: Arc<dyn DocumentStore>,
    collection: String,
    clock: Arc<dyn Clock>,
}

impl DocumentCache {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self::with_clock(store, collection, system_clock())
    }

    pub fn with_clock(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            clock,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl CacheBackend for DocumentCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entry(key).await?.map(|e| e.data))
    }

    async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let id = key.digest();
        let Some(record) = self.store.get(&self.collection, &id).await? else {
            return Ok(None);
        };
        if record.is_expired(self.clock.now_ms()) {
            self.store
                .delete_if_unchanged(&self.collection, &id, record.stored_at_ms)
                .await?;
            return Ok(None);
        }
        let ttl = Duration::from_millis(record.expires_at_ms.saturating_sub(record.stored_at_ms));
        let data = serde_json::to_vec(&record.payload)?;
        Ok(Some(CacheEntry::new(data, record.stored_at_ms, ttl)))
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let payload: serde_json::Value = serde_json::from_slice(value)?;
        let now = self.clock.now_ms();
        let id = key.digest();
        let record = DocumentRecord {
            key: key.as_str().to_string(),
            payload,
            stored_at_ms: now,
            expires_at_ms: now.saturating_add(ttl_millis(ttl)),
        };
        self.store.put(&self.collection, &id, record).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.store.delete(&self.collection, &key.digest()).await
    }

    async fn sweep_expired(&self) -> Result<usize> {
        self.store
            .delete_expired(&self.collection, self.clock.now_ms())
            .await
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear(&self.collection).await
    }

    async fn len(&self) -> Result<usize> {
        self.store
            .count_unexpired(&self.collection, self.clock.now_ms())
            .await
    }

    fn name(&self) -> &'static str {
        "document"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn document_cache_honours_ttl() {
        let clock = ManualClock::new(1_000);
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let cache = DocumentCache::with_clock(store.clone(), "onet", Arc::new(clock.clone()));
        let key = CacheKey::new("onet:15-1252.00");

        cache
            .set(&key, br#"{"title":"Software Developers"}"#, Duration::from_millis(100))
            .await
            .unwrap();
        let entry = cache.entry(&key).await.unwrap().unwrap();
        assert_eq!(entry.stored_at_ms, 1_000);
        assert_eq!(entry.ttl, Duration::from_millis(100));

        clock.advance(Duration::from_millis(100));
        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(store.count("onet").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn len_ignores_expired_records_before_sweep() {
        let clock = ManualClock::new(0);
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let cache = DocumentCache::with_clock(store.clone(), "ai", Arc::new(clock.clone()));
        cache
            .set(&"short".into(), b"1", Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .set(&"long".into(), b"2", Duration::from_secs(60))
            .await
            .unwrap();

        clock.advance(Duration::from_millis(50));
        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(store.count("ai").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stale_delete_keeps_refreshed_record() {
        let store = InMemoryDocumentStore::new();
        let record = |stored_at_ms| DocumentRecord {
            key: "k".into(),
            payload: serde_json::json!(stored_at_ms),
            stored_at_ms,
            expires_at_ms: stored_at_ms + 10,
        };
        store.put("c", "k", record(0)).await.unwrap();
        // A refresh lands between the expiry check and the delete.
        store.put("c", "k", record(20)).await.unwrap();

        assert!(!store.delete_if_unchanged("c", "k", 0).await.unwrap());
        assert_eq!(store.get("c", "k").await.unwrap(), Some(record(20)));
        assert!(store.delete_if_unchanged("c", "k", 20).await.unwrap());
        assert_eq!(store.get("c", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn max_duration_ttl_is_stored_without_truncation() {
        let clock = ManualClock::new(1_700_000_000_000);
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let cache = DocumentCache::with_clock(store.clone(), "ai", Arc::new(clock.clone()));
        cache.set(&"k".into(), b"1", Duration::MAX).await.unwrap();
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert!(cache.get(&"k".into()).await.unwrap().is_some());
        let record = store.get("ai", &CacheKey::new("k").digest()).await.unwrap();
        assert_eq!(record.map(|r| r.expires_at_ms), Some(u64::MAX));
    }

    #[tokio::test]
    async fn rejects_non_json_payloads() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let cache = DocumentCache::new(store, "ai");
        let err = cache
            .set(&"k".into(), b"not json", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[tokio::test]
    async fn delete_expired_only_touches_expired_records() {
        let store = InMemoryDocumentStore::new();
        for (key, expires) in [("old", 50), ("edge", 100), ("fresh", 150)] {
            store
                .put(
                    "onet",
                    key,
                    DocumentRecord {
                        key: key.into(),
                        payload: serde_json::json!({}),
                        stored_at_ms: 0,
                        expires_at_ms: expires,
                    },
                )
                .await
                .unwrap();
        }
        assert_eq!(store.delete_expired("onet", 100).await.unwrap(), 2);
        assert!(store.get("onet", "fresh").await.unwrap().is_some());
        assert_eq!(store.delete_expired("missing", 100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_collections() {
        let store = JsonFileDocumentStore::new(std::env::temp_dir());
        let err = store.count("../etc").await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
