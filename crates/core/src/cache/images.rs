//! Poster image cache.
//!
//! Images are fetched through an `ImageSource`, encoded as base64 data URLs,
//! and persisted under `image_{url}` when the raw image is smaller than the
//! configured cap. Larger images are still returned for display but never
//! written. Image writes that hit the quota evict the oldest image entries only.

use super::{CacheKind, is_fresh};
use crate::Error;
use crate::storage::{StorageHandler, now_millis};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::Duration;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Raw image bytes as returned by a source.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Anything that can download an image by URL.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, Error>;
}

/// Image cache tuning.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Images must be strictly smaller than this to be persisted.
    pub max_bytes: usize,
    /// Upper bound on persisted images.
    pub max_entries: usize,
    /// Share of image entries evicted when a write hits the quota.
    pub eviction_fraction: f64,
    /// Freshness window.
    pub ttl: Duration,
    /// Parallel downloads during preload.
    pub concurrency: usize,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self { max_bytes: 300 * 1024, max_entries: 150, eviction_fraction: 0.4, ttl: Duration::days(7), concurrency: 4 }
    }
}

/// A loaded image ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct CachedImage {
    pub url: String,
    pub data_url: String,
    pub from_cache: bool,
    pub persisted: bool,
    /// Fetched at or above the size cap, so never written.
    pub oversized: bool,
}

/// Tally of a preload run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    /// Already fresh in storage.
    pub cached: usize,
    /// Downloaded during this run.
    pub fetched: usize,
    /// Downloaded and written to storage.
    pub persisted: usize,
    /// Downloaded but at or above the size cap.
    pub oversized: usize,
    pub failed: usize,
    /// Already being loaded by another caller.
    pub skipped: usize,
}

enum Outcome {
    Cached,
    Fetched { persisted: bool, oversized: bool },
    Failed,
    Skipped,
}

/// Base64 poster cache with a size cap and oldest-first eviction.
#[derive(Clone)]
pub struct ImageCache {
    handler: StorageHandler,
    source: Arc<dyn ImageSource>,
    config: ImageCacheConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Encode raw bytes as a `data:` URL.
pub fn to_data_url(content_type: Option<&str>, bytes: &[u8]) -> String {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

impl ImageCache {
    pub fn new(handler: StorageHandler, source: Arc<dyn ImageSource>, config: ImageCacheConfig) -> Self {
        Self { handler, source, config, in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }

    pub fn config(&self) -> &ImageCacheConfig {
        &self.config
    }

    /// Whether a fresh copy of `url` is in storage.
    pub async fn is_cached(&self, url: &str) -> bool {
        self.cached_at(url, now_millis()).await.is_some()
    }

    async fn cached_at(&self, url: &str, now: i64) -> Option<String> {
        let key = CacheKind::Image.key(url);
        let timestamp = self.handler.timestamp(&key).await?;
        if !is_fresh(timestamp, now, self.config.ttl) {
            tracing::debug!(url, "cached image expired");
            self.handler.remove_entry(&key).await;
            return None;
        }
        self.handler.safe_get(&key).await
    }

    /// Return the image from storage, or fetch (and maybe persist) it.
    pub async fn load(&self, url: &str) -> Result<CachedImage, Error> {
        self.load_at(url, now_millis()).await
    }

    pub async fn load_at(&self, url: &str, now: i64) -> Result<CachedImage, Error> {
        if let Some(data_url) = self.cached_at(url, now).await {
            return Ok(CachedImage {
                url: url.to_string(),
                data_url,
                from_cache: true,
                persisted: true,
                oversized: false,
            });
        }

        let image = self.source.fetch_image(url).await?;
        let data_url = to_data_url(image.content_type.as_deref(), &image.bytes);

        let oversized = image.bytes.len() >= self.config.max_bytes;
        let persisted = if oversized {
            tracing::debug!(url, bytes = image.bytes.len(), cap = self.config.max_bytes, "image too large to cache");
            false
        } else {
            self.persist(url, &data_url, now).await
        };

        Ok(CachedImage { url: url.to_string(), data_url, from_cache: false, persisted, oversized })
    }

    async fn persist(&self, url: &str, data_url: &str, now: i64) -> bool {
        let key = CacheKind::Image.key(url);
        let prefix = CacheKind::Image.prefix();

        let stored = self
            .handler
            .set_entry(&key, data_url, now, Some(&prefix), self.config.eviction_fraction)
            .await;

        if stored {
            let evicted = self.handler.evict_beyond(Some(&prefix), self.config.max_entries).await;
            if evicted > 0 {
                tracing::debug!(evicted, max = self.config.max_entries, "trimmed image cache");
            }
        }
        stored
    }

    /// Warm the cache for a batch of URLs.
    ///
    /// Duplicates and blank URLs are ignored; failures are counted, never returned.
    pub async fn preload<I, S>(&self, urls: I) -> PreloadReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<String> = urls
            .into_iter()
            .map(Into::into)
            .filter(|url: &String| !url.trim().is_empty() && seen.insert(url.clone()))
            .collect();

        let outcomes: Vec<Outcome> = stream::iter(unique)
            .map(|url| async move { self.preload_one(url).await })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = PreloadReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Cached => report.cached += 1,
                Outcome::Fetched { persisted, oversized } => {
                    report.fetched += 1;
                    report.persisted += usize::from(persisted);
                    report.oversized += usize::from(oversized);
                }
                Outcome::Failed => report.failed += 1,
                Outcome::Skipped => report.skipped += 1,
            }
        }

        tracing::debug!(?report, "image preload finished");
        report
    }

    async fn preload_one(&self, url: String) -> Outcome {
        if !self.in_flight.lock().await.insert(url.clone()) {
            return Outcome::Skipped;
        }

        let outcome = if self.is_cached(&url).await {
            Outcome::Cached
        } else {
            match self.load(&url).await {
                Ok(image) => Outcome::Fetched { persisted: image.persisted, oversized: image.oversized },
                Err(e) => {
                    tracing::debug!(url, error = %e, "image preload failed");
                    Outcome::Failed
                }
            }
        };

        self.in_flight.lock().await.remove(&url);
        outcome
    }
}
