//! Memoized API responses.

use super::{CacheKind, CacheTtls, is_fresh};
use crate::storage::{StorageHandler, StorageUsage, now_millis};
use serde::{Serialize, de::DeserializeOwned};

/// Entry counts per cache kind plus store usage.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub per_kind: Vec<KindCount>,
    pub usage: Option<StorageUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindCount {
    pub kind: CacheKind,
    pub entries: usize,
}

impl CacheStats {
    pub fn total_entries(&self) -> usize {
        self.per_kind.iter().map(|c| c.entries).sum()
    }

    pub fn entries_for(&self, kind: CacheKind) -> usize {
        self.per_kind
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.entries)
            .unwrap_or(0)
    }
}

/// JSON response cache keyed by `{kind}_{query-or-page}`.
#[derive(Debug, Clone)]
pub struct ResultCache {
    handler: StorageHandler,
    ttls: CacheTtls,
}

impl ResultCache {
    pub fn new(handler: StorageHandler, ttls: CacheTtls) -> Self {
        Self { handler, ttls }
    }

    pub fn handler(&self) -> &StorageHandler {
        &self.handler
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    /// Fetch a fresh cached value.
    pub async fn get<T: DeserializeOwned>(&self, kind: CacheKind, query: &str) -> Option<T> {
        self.get_at(kind, query, now_millis()).await
    }

    /// Fetch a cached value as seen at `now` (epoch ms).
    ///
    /// Stale entries and values without a timestamp are removed and read as a miss.
    pub async fn get_at<T: DeserializeOwned>(&self, kind: CacheKind, query: &str, now: i64) -> Option<T> {
        let key = kind.key(query);

        let Some(timestamp) = self.handler.timestamp(&key).await else {
            if self.handler.safe_get(&key).await.is_some() {
                tracing::debug!(key, "removing cache value without timestamp");
                self.handler.remove_entry(&key).await;
            }
            return None;
        };

        if !is_fresh(timestamp, now, self.ttls.for_kind(kind)) {
            tracing::debug!(key, age_ms = now.saturating_sub(timestamp), "cache entry expired");
            self.handler.remove_entry(&key).await;
            return None;
        }

        let value = self.handler.safe_get_json(&key).await;
        if value.is_some() {
            tracing::debug!(key, "cache hit");
        }
        value
    }

    /// Store a value. Returns whether it was persisted.
    pub async fn put<T: Serialize>(&self, kind: CacheKind, query: &str, value: &T) -> bool {
        self.put_at(kind, query, value, now_millis()).await
    }

    /// Store a value stamped with `now` (epoch ms).
    pub async fn put_at<T: Serialize>(&self, kind: CacheKind, query: &str, value: &T, now: i64) -> bool {
        let key = kind.key(query);
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode cache value");
                return false;
            }
        };

        let stored = self.handler.set_with_timestamp(&key, &json, now).await;
        if !stored {
            tracing::warn!(key, bytes = json.len(), "cache write skipped");
        }
        stored
    }

    /// Drop one entry.
    pub async fn invalidate(&self, kind: CacheKind, query: &str) {
        self.handler.remove_entry(&kind.key(query)).await;
    }

    /// Drop every entry of a kind. Returns how many were removed.
    pub async fn clear_kind(&self, kind: CacheKind) -> usize {
        let entries = self.handler.entries(Some(&kind.prefix())).await;
        for entry in &entries {
            self.handler.remove_entry(&entry.key).await;
        }
        entries.len()
    }

    /// Remove expired entries of every kind.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(now_millis()).await
    }

    pub async fn purge_expired_at(&self, now: i64) -> usize {
        let mut purged = 0;
        for kind in CacheKind::ALL {
            let ttl = self.ttls.for_kind(kind).num_milliseconds();
            purged += self.handler.purge_expired(Some(&kind.prefix()), ttl, now).await;
        }
        tracing::info!(purged, "purged expired cache entries");
        purged
    }

    /// Entry counts per kind and store usage.
    pub async fn stats(&self) -> CacheStats {
        let mut per_kind = Vec::with_capacity(CacheKind::ALL.len());
        for kind in CacheKind::ALL {
            let entries = self.handler.entries(Some(&kind.prefix())).await.len();
            per_kind.push(KindCount { kind, entries });
        }

        let usage = match self.handler.storage().usage().await {
            Ok(usage) => Some(usage),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read storage usage");
                None
            }
        };

        CacheStats { per_kind, usage }
    }
}
