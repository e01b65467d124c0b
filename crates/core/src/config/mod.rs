//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CINEDEX_*)
//! 2. TOML config file (if CINEDEX_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheTtls, ImageCacheConfig};

mod validation;

pub use validation::ConfigError;
use validation::{MAX_TTL_DAYS, MAX_TTL_MINUTES};

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CINEDEX_*)
/// 2. TOML config file (if CINEDEX_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// TMDB v3 API key.
    ///
    /// Set via CINEDEX_TMDB_API_KEY environment variable.
    /// Required only when a request reaches the network.
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// Path to the SQLite storage file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Response language sent to TMDB (`en` or `en-US` form).
    #[serde(default = "default_language")]
    pub language: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Byte quota of the key/value store.
    #[serde(default = "default_storage_quota_bytes")]
    pub storage_quota_bytes: u64,

    /// Freshness window for listings, single search pages, details and seasons.
    #[serde(default = "default_listing_ttl_minutes")]
    pub listing_ttl_minutes: i64,

    /// Freshness window for aggregated (multi-page) searches.
    #[serde(default = "default_search_ttl_minutes")]
    pub search_ttl_minutes: i64,

    /// Freshness window for cached poster images.
    #[serde(default = "default_image_ttl_days")]
    pub image_ttl_days: i64,

    /// Images at or above this size are shown but never persisted.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Maximum number of persisted images.
    #[serde(default = "default_max_image_entries")]
    pub max_image_entries: usize,

    /// Share of cache entries dropped when the store is full.
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,

    /// Share of image entries dropped when an image write hits the quota.
    #[serde(default = "default_image_eviction_fraction")]
    pub image_eviction_fraction: f64,

    /// Base URL for TMDB images.
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    /// Poster size segment (`w185`, `w342`, `w500`, `original`, ...).
    #[serde(default = "default_poster_size")]
    pub poster_size: String,

    /// Whether successful loads trigger poster preloading.
    #[serde(default = "default_true")]
    pub preload_images: bool,

    /// Concurrent poster downloads during preload.
    #[serde(default = "default_preload_concurrency")]
    pub preload_concurrency: usize,

    /// Number of result pages merged by an aggregated search.
    #[serde(default = "default_max_search_pages")]
    pub max_search_pages: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./cinedex-cache.sqlite")
}

fn default_language() -> String {
    "en-US".into()
}

fn default_user_agent() -> String {
    "cinedex/0.1".into()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_storage_quota_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_listing_ttl_minutes() -> i64 {
    30
}

fn default_search_ttl_minutes() -> i64 {
    60
}

fn default_image_ttl_days() -> i64 {
    7
}

fn default_max_image_bytes() -> usize {
    300 * 1024
}

fn default_max_image_entries() -> usize {
    150
}

fn default_eviction_fraction() -> f64 {
    0.3
}

fn default_image_eviction_fraction() -> f64 {
    0.4
}

fn default_image_base_url() -> String {
    "https://image.tmdb.org/t/p".into()
}

fn default_poster_size() -> String {
    "w342".into()
}

fn default_true() -> bool {
    true
}

fn default_preload_concurrency() -> usize {
    4
}

fn default_max_search_pages() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            db_path: default_db_path(),
            language: default_language(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            storage_quota_bytes: default_storage_quota_bytes(),
            listing_ttl_minutes: default_listing_ttl_minutes(),
            search_ttl_minutes: default_search_ttl_minutes(),
            image_ttl_days: default_image_ttl_days(),
            max_image_bytes: default_max_image_bytes(),
            max_image_entries: default_max_image_entries(),
            eviction_fraction: default_eviction_fraction(),
            image_eviction_fraction: default_image_eviction_fraction(),
            image_base_url: default_image_base_url(),
            poster_size: default_poster_size(),
            preload_images: true,
            preload_concurrency: default_preload_concurrency(),
            max_search_pages: default_max_search_pages(),
        }
    }
}

fn ttl_minutes(minutes: i64) -> chrono::Duration {
    chrono::Duration::minutes(minutes.clamp(1, MAX_TTL_MINUTES))
}

fn ttl_days(days: i64) -> chrono::Duration {
    chrono::Duration::days(days.clamp(1, MAX_TTL_DAYS))
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Freshness windows derived from the configured minutes/days.
    ///
    /// Values are clamped to the range `validate` accepts.
    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            listing: ttl_minutes(self.listing_ttl_minutes),
            aggregate: ttl_minutes(self.search_ttl_minutes),
            image: ttl_days(self.image_ttl_days),
        }
    }

    pub fn image_cache_config(&self) -> ImageCacheConfig {
        ImageCacheConfig {
            max_bytes: self.max_image_bytes,
            max_entries: self.max_image_entries,
            eviction_fraction: self.image_eviction_fraction,
            ttl: ttl_days(self.image_ttl_days),
            concurrency: self.preload_concurrency,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CINEDEX_`
    /// 2. TOML file from `CINEDEX_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CINEDEX_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("CINEDEX_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    /// Load configuration from an explicit TOML file layered under the environment.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CINEDEX_").map(|key| key.as_str().to_lowercase().into()).split("__"));

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Return the TMDB API key (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_tmdb_api_key(&self) -> Result<&str, ConfigError> {
        self.tmdb_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "tmdb_api_key".into(),
                hint: "Set CINEDEX_TMDB_API_KEY environment variable".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./cinedex-cache.sqlite"));
        assert_eq!(config.user_agent, "cinedex/0.1");
        assert_eq!(config.storage_quota_bytes, 5_242_880);
        assert_eq!(config.max_image_bytes, 307_200);
        assert_eq!(config.listing_ttl_minutes, 30);
        assert_eq!(config.search_ttl_minutes, 60);
        assert_eq!(config.image_ttl_days, 7);
        assert!(config.preload_images);
        assert!(config.tmdb_api_key.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(15_000));
    }

    #[test]
    fn test_cache_ttls() {
        let ttls = AppConfig::default().cache_ttls();
        assert_eq!(ttls.listing, chrono::Duration::minutes(30));
        assert_eq!(ttls.aggregate, chrono::Duration::minutes(60));
        assert_eq!(ttls.image, chrono::Duration::days(7));
    }

    #[test]
    fn test_out_of_range_ttls_do_not_panic() {
        let config = AppConfig { listing_ttl_minutes: i64::MAX / 2, image_ttl_days: i64::MIN, ..Default::default() };
        assert!(config.validate().is_err());

        let ttls = config.cache_ttls();
        assert_eq!(ttls.listing, chrono::Duration::minutes(525_600));
        assert_eq!(ttls.image, chrono::Duration::days(1));
        assert_eq!(config.image_cache_config().ttl, chrono::Duration::days(1));
    }

    #[test]
    fn test_require_tmdb_api_key_missing() {
        let config = AppConfig::default();
        assert!(matches!(config.require_tmdb_api_key(), Err(ConfigError::Missing { .. })));

        let blank = AppConfig { tmdb_api_key: Some("  ".into()), ..Default::default() };
        assert!(matches!(blank.require_tmdb_api_key(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_tmdb_api_key_present() {
        let config = AppConfig { tmdb_api_key: Some("test-key".into()), ..Default::default() };
        assert_eq!(config.require_tmdb_api_key().unwrap(), "test-key");
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("cinedex-config-{}.toml", std::process::id()));
        std::fs::write(&path, "poster_size = \"w500\"\nmax_search_pages = 5\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.poster_size, "w500");
        assert_eq!(config.max_search_pages, 5);
        assert_eq!(config.language, "en-US");

        std::fs::remove_file(&path).ok();
    }
}
