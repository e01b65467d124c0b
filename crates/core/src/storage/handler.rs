//! Safe persistence with quota recovery.
//!
//! A cache entry is a key `K` stored next to `K_timestamp`, which holds the
//! write time in epoch milliseconds. Only keys with a timestamp sibling are
//! eligible for eviction; anything else in the store is left alone.
//!
//! Writes never fail loudly. When the backend reports `QuotaExceeded`, the
//! oldest share of cache entries is evicted and the write is retried once.
//! If that also fails the write is dropped and `false` is returned, so callers
//! keep showing the data they already have.

use super::Storage;
use crate::Error;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;

/// Suffix of the sibling key holding an entry's write time.
pub const TIMESTAMP_SUFFIX: &str = "_timestamp";

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A timestamped cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub timestamp: i64,
}

/// Wraps a `Storage` backend with error-swallowing reads and writes.
#[derive(Debug, Clone)]
pub struct StorageHandler {
    storage: Arc<dyn Storage>,
    eviction_fraction: f64,
}

impl StorageHandler {
    /// Create a handler that evicts `eviction_fraction` of cache entries on quota errors.
    pub fn new(storage: Arc<dyn Storage>, eviction_fraction: f64) -> Self {
        Self { storage, eviction_fraction: eviction_fraction.clamp(f64::MIN_POSITIVE, 1.0) }
    }

    /// The underlying backend.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn timestamp_key(key: &str) -> String {
        format!("{key}{TIMESTAMP_SUFFIX}")
    }

    /// Read a value, treating backend errors as a miss.
    pub async fn safe_get(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    /// Read and decode a JSON value. Undecodable values are removed.
    pub async fn safe_get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.safe_get(key).await?;
        match decode_json(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "dropping undecodable cache value");
                self.remove_entry(key).await;
                None
            }
        }
    }

    /// Write a value without a timestamp.
    ///
    /// Returns `false` when the value could not be stored even after eviction.
    pub async fn safe_set(&self, key: &str, value: &str) -> bool {
        self.write_with_recovery(key, value, None, self.eviction_fraction, None).await
    }

    /// Write a value together with its `_timestamp` sibling.
    pub async fn set_with_timestamp(&self, key: &str, value: &str, now: i64) -> bool {
        self.set_entry(key, value, now, None, self.eviction_fraction).await
    }

    /// Write a timestamped entry, evicting only entries under `evict_prefix`
    /// (all cache entries when `None`) if the store is full.
    ///
    /// A value whose timestamp cannot be written is removed again.
    pub async fn set_entry(
        &self, key: &str, value: &str, now: i64, evict_prefix: Option<&str>, fraction: f64,
    ) -> bool {
        if !self.write_with_recovery(key, value, evict_prefix, fraction, Some(key)).await {
            return false;
        }

        let ts_key = Self::timestamp_key(key);
        if self
            .write_with_recovery(&ts_key, &now.to_string(), evict_prefix, fraction, Some(key))
            .await
        {
            return true;
        }

        tracing::warn!(key, "timestamp write failed, removing untimed value");
        if let Err(e) = self.storage.remove_item(key).await {
            tracing::warn!(key, error = %e, "failed to remove untimed value");
        }
        false
    }

    async fn write_with_recovery(
        &self, key: &str, value: &str, evict_prefix: Option<&str>, fraction: f64, protect: Option<&str>,
    ) -> bool {
        match self.storage.set_item(key, value).await {
            Ok(()) => return true,
            Err(e) if e.is_quota_exceeded() => {
                tracing::info!(key, error = %e, "storage quota exceeded, evicting oldest entries");
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "storage write failed");
                return false;
            }
        }

        let evicted = self.evict_oldest_except(evict_prefix, fraction, protect).await;
        tracing::debug!(key, evicted, "retrying write after eviction");

        match self.storage.set_item(key, value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, bytes = value.len(), error = %e, "write dropped after eviction retry");
                false
            }
        }
    }

    /// Recorded write time of an entry.
    pub async fn timestamp(&self, key: &str) -> Option<i64> {
        self.safe_get(&Self::timestamp_key(key)).await?.trim().parse().ok()
    }

    /// Remove an entry and its timestamp.
    pub async fn remove_entry(&self, key: &str) {
        for k in [key.to_string(), Self::timestamp_key(key)] {
            if let Err(e) = self.storage.remove_item(&k).await {
                tracing::warn!(key = %k, error = %e, "storage remove failed");
            }
        }
    }

    /// Timestamped entries whose key starts with `prefix`, oldest first.
    ///
    /// A key counts only when both it and its `_timestamp` sibling are stored,
    /// so a value whose own key ends in `_timestamp` is still one entry.
    /// Entries whose timestamp does not parse are skipped.
    pub async fn entries(&self, prefix: Option<&str>) -> Vec<CacheEntry> {
        let keys: HashSet<String> = match self.storage.keys().await {
            Ok(keys) => keys.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list storage keys");
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        for key in &keys {
            if let Some(prefix) = prefix
                && !key.starts_with(prefix)
            {
                continue;
            }
            let ts_key = Self::timestamp_key(key);
            if !keys.contains(&ts_key) {
                continue;
            }
            let Some(timestamp) = self.safe_get(&ts_key).await.and_then(|raw| raw.trim().parse().ok()) else {
                tracing::debug!(key = %key, "skipping entry with unreadable timestamp");
                continue;
            };
            entries.push(CacheEntry { key: key.clone(), timestamp });
        }

        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    /// Evict the oldest `fraction` of entries (at least one if any exist).
    ///
    /// Returns the number of entries removed.
    pub async fn evict_oldest(&self, prefix: Option<&str>, fraction: f64) -> usize {
        self.evict_oldest_except(prefix, fraction, None).await
    }

    async fn evict_oldest_except(&self, prefix: Option<&str>, fraction: f64, protect: Option<&str>) -> usize {
        let entries: Vec<CacheEntry> = self
            .entries(prefix)
            .await
            .into_iter()
            .filter(|entry| Some(entry.key.as_str()) != protect)
            .collect();
        if entries.is_empty() {
            return 0;
        }

        let count = eviction_count(entries.len(), fraction);
        for entry in entries.iter().take(count) {
            self.remove_entry(&entry.key).await;
        }

        tracing::debug!(prefix = prefix.unwrap_or("*"), evicted = count, total = entries.len(), "evicted oldest entries");
        count
    }

    /// Evict oldest entries under `prefix` until at most `max_entries` remain.
    pub async fn evict_beyond(&self, prefix: Option<&str>, max_entries: usize) -> usize {
        let entries = self.entries(prefix).await;
        if entries.len() <= max_entries {
            return 0;
        }

        let excess = entries.len() - max_entries;
        for entry in entries.iter().take(excess) {
            self.remove_entry(&entry.key).await;
        }
        excess
    }

    /// Remove entries under `prefix` whose age is at least `ttl_ms`, or whose
    /// timestamp lies after `now`.
    pub async fn purge_expired(&self, prefix: Option<&str>, ttl_ms: i64, now: i64) -> usize {
        let mut purged = 0;
        for entry in self.entries(prefix).await {
            if now < entry.timestamp || now.saturating_sub(entry.timestamp) >= ttl_ms {
                self.remove_entry(&entry.key).await;
                purged += 1;
            }
        }
        purged
    }

    /// Remove every key, cache entry or not.
    pub async fn clear(&self) -> Result<(), Error> {
        self.storage.clear().await
    }
}

fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, Error> {
    Ok(serde_json::from_str(raw)?)
}

/// Number of entries to drop out of `total` for the given fraction.
pub(crate) fn eviction_count(total: usize, fraction: f64) -> usize {
    if total == 0 {
        return 0;
    }
    let count = (total as f64 * fraction).ceil() as usize;
    count.clamp(1, total)
}
