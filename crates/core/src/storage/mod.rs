//! Quota-bounded key/value storage.
//!
//! Values are opaque strings, the way browser storage holds them. Every
//! backend enforces a byte quota counted as `key.len() + value.len()` per
//! entry and reports `Error::QuotaExceeded` instead of growing past it.
//!
//! - `SqliteStorage`: persistent, one SQLite file, WAL mode
//! - `MemoryStorage`: in-process map for tests and throwaway sessions
//! - `StorageHandler`: safe reads/writes with quota recovery on top of either

pub mod connection;
pub mod handler;
pub mod memory;
pub mod migrations;

pub use connection::SqliteStorage;
pub use handler::{CacheEntry, StorageHandler, TIMESTAMP_SUFFIX, now_millis};
pub use memory::MemoryStorage;

use crate::Error;
use async_trait::async_trait;
use serde::Serialize;

/// Current space accounting of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub quota_bytes: u64,
    pub entries: u64,
}

impl StorageUsage {
    /// Bytes still available before the quota is hit.
    pub fn available_bytes(&self) -> u64 {
        self.quota_bytes.saturating_sub(self.used_bytes)
    }
}

/// Byte cost of one stored entry.
pub fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// A string key/value store with a byte quota.
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Read a value. `Ok(None)` when the key is absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error>;

    /// Insert or replace a value.
    ///
    /// Fails with `Error::QuotaExceeded` when the store would exceed its quota;
    /// the previous value (if any) is left untouched in that case.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a value. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), Error>;

    /// All keys currently stored.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Space accounting.
    async fn usage(&self) -> Result<StorageUsage, Error>;

    /// Remove everything.
    async fn clear(&self) -> Result<(), Error>;
}
