//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// Longest accepted listing or search window (one year).
pub(crate) const MAX_TTL_MINUTES: i64 = 525_600;
/// Longest accepted image window.
pub(crate) const MAX_TTL_DAYS: i64 = 365;

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `storage_quota_bytes` is below 64KB
    /// - any freshness window is not positive or longer than a year
    /// - an eviction fraction is outside `(0, 1]`
    /// - `max_image_bytes` is 0 or larger than the storage quota
    /// - `preload_concurrency` or `max_search_pages` is out of range
    /// - `user_agent`, `language`, `image_base_url` or `poster_size` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.storage_quota_bytes < 64 * 1024 {
            return Err(invalid("storage_quota_bytes", "must be at least 64KB"));
        }

        if !(1..=MAX_TTL_MINUTES).contains(&self.listing_ttl_minutes) {
            return Err(invalid("listing_ttl_minutes", "must be between 1 and 525600 (one year)"));
        }
        if !(1..=MAX_TTL_MINUTES).contains(&self.search_ttl_minutes) {
            return Err(invalid("search_ttl_minutes", "must be between 1 and 525600 (one year)"));
        }
        if !(1..=MAX_TTL_DAYS).contains(&self.image_ttl_days) {
            return Err(invalid("image_ttl_days", "must be between 1 and 365"));
        }

        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(invalid("eviction_fraction", "must be within (0, 1]"));
        }
        if !(self.image_eviction_fraction > 0.0 && self.image_eviction_fraction <= 1.0) {
            return Err(invalid("image_eviction_fraction", "must be within (0, 1]"));
        }

        if self.max_image_bytes == 0 {
            return Err(invalid("max_image_bytes", "must be greater than 0"));
        }
        if self.max_image_bytes as u64 > self.storage_quota_bytes {
            return Err(invalid("max_image_bytes", "must not exceed storage_quota_bytes"));
        }
        if self.max_image_entries == 0 {
            return Err(invalid("max_image_entries", "must be greater than 0"));
        }

        if self.preload_concurrency == 0 || self.preload_concurrency > 32 {
            return Err(invalid("preload_concurrency", "must be between 1 and 32"));
        }
        if self.max_search_pages == 0 || self.max_search_pages > 20 {
            return Err(invalid("max_search_pages", "must be between 1 and 20"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.language.trim().is_empty() {
            return Err(invalid("language", "must not be empty"));
        }
        if self.image_base_url.trim().is_empty() {
            return Err(invalid("image_base_url", "must not be empty"));
        }
        if self.poster_size.trim().is_empty() {
            return Err(invalid("poster_size", "must not be empty"));
        }

        if self.max_image_bytes as u64 > self.storage_quota_bytes / 4 {
            tracing::warn!(
                max_image_bytes = self.max_image_bytes,
                storage_quota_bytes = self.storage_quota_bytes,
                "a single persisted image may take more than a quarter of the storage quota"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_quota_too_small() {
        let config = AppConfig { storage_quota_bytes: 1024, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "storage_quota_bytes"));
    }

    #[test]
    fn test_validate_ttl_not_positive() {
        let config = AppConfig { search_ttl_minutes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "search_ttl_minutes"));
    }

    #[test]
    fn test_validate_ttl_upper_bounds() {
        let listing = AppConfig { listing_ttl_minutes: i64::MAX / 2, ..Default::default() };
        assert!(
            matches!(listing.validate(), Err(ConfigError::Invalid { field, .. }) if field == "listing_ttl_minutes")
        );

        let image = AppConfig { image_ttl_days: 366, ..Default::default() };
        assert!(matches!(image.validate(), Err(ConfigError::Invalid { field, .. }) if field == "image_ttl_days"));

        let year =
            AppConfig { search_ttl_minutes: MAX_TTL_MINUTES, image_ttl_days: MAX_TTL_DAYS, ..Default::default() };
        assert!(year.validate().is_ok());
    }

    #[test]
    fn test_validate_eviction_fraction_bounds() {
        let zero = AppConfig { eviction_fraction: 0.0, ..Default::default() };
        assert!(matches!(zero.validate(), Err(ConfigError::Invalid { field, .. }) if field == "eviction_fraction"));

        let full = AppConfig { eviction_fraction: 1.0, ..Default::default() };
        assert!(full.validate().is_ok());

        let nan = AppConfig { image_eviction_fraction: f64::NAN, ..Default::default() };
        assert!(
            matches!(nan.validate(), Err(ConfigError::Invalid { field, .. }) if field == "image_eviction_fraction")
        );
    }

    #[test]
    fn test_validate_image_cap_above_quota() {
        let config = AppConfig { storage_quota_bytes: 100 * 1024, max_image_bytes: 200 * 1024, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_image_bytes"));
    }

    #[test]
    fn test_validate_search_pages_range() {
        let config = AppConfig { max_search_pages: 21, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_search_pages"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            timeout_ms: 100,
            storage_quota_bytes: 64 * 1024,
            max_image_bytes: 64 * 1024,
            preload_concurrency: 1,
            max_search_pages: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
