//! Time-boxed caches over `StorageHandler`.
//!
//! - `ResultCache`: API responses as JSON, 30 minute window for listings and
//!   single pages, 60 minutes for aggregated searches
//! - `ImageCache`: posters as base64 data URLs, 7 day window, size capped
//!
//! A read is a hit only while `now - timestamp < window`. Timestamps from the
//! future (a clock that moved backwards) are stale.

pub mod images;
pub mod keys;
pub mod results;

pub use images::{CachedImage, FetchedImage, ImageCache, ImageCacheConfig, ImageSource, PreloadReport};
pub use keys::{CacheKind, normalize_term, search_query};
pub use results::{CacheStats, ResultCache};

use chrono::Duration;

/// Freshness windows per cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Listings, single search pages, details and seasons.
    pub listing: Duration,
    /// Aggregated multi-page searches.
    pub aggregate: Duration,
    /// Poster images.
    pub image: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self { listing: Duration::minutes(30), aggregate: Duration::minutes(60), image: Duration::days(7) }
    }
}

impl CacheTtls {
    pub fn for_kind(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Aggregate => self.aggregate,
            CacheKind::Image => self.image,
            CacheKind::Movies | CacheKind::Tv | CacheKind::Search | CacheKind::Detail | CacheKind::Season => {
                self.listing
            }
        }
    }
}

/// Whether an entry written at `timestamp` is still fresh at `now`.
pub fn is_fresh(timestamp: i64, now: i64, ttl: Duration) -> bool {
    now >= timestamp && now.saturating_sub(timestamp) < ttl.num_milliseconds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.for_kind(CacheKind::Movies), Duration::minutes(30));
        assert_eq!(ttls.for_kind(CacheKind::Search), Duration::minutes(30));
        assert_eq!(ttls.for_kind(CacheKind::Aggregate), Duration::minutes(60));
        assert_eq!(ttls.for_kind(CacheKind::Image), Duration::days(7));
    }

    #[test]
    fn test_freshness_is_strict() {
        let ttl = Duration::minutes(30);
        let written = 1_000_000;
        assert!(is_fresh(written, written, ttl));
        assert!(is_fresh(written, written + ttl.num_milliseconds() - 1, ttl));
        assert!(!is_fresh(written, written + ttl.num_milliseconds(), ttl));
    }

    #[test]
    fn test_future_timestamp_is_stale() {
        let ttl = Duration::minutes(30);
        assert!(!is_fresh(1_000_000, 999_999, ttl));
        assert!(!is_fresh(i64::MAX, 0, ttl));
    }
}
