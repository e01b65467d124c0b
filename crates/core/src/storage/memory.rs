//! In-process storage backend.

use super::{Storage, StorageUsage, entry_size};
use crate::Error;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Map-backed store with the same quota rules as `SqliteStorage`.
#[derive(Debug)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
    quota_bytes: u64,
}

impl MemoryStorage {
    pub fn new(quota_bytes: u64) -> Self {
        Self { items: RwLock::new(BTreeMap::new()), quota_bytes }
    }
}

fn used_bytes(items: &BTreeMap<String, String>) -> u64 {
    items.iter().map(|(k, v)| entry_size(k, v)).sum()
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut items = self.items.write().await;
        let size = entry_size(key, value);
        let others = used_bytes(&items) - items.get(key).map(|old| entry_size(key, old)).unwrap_or(0);

        if others + size > self.quota_bytes {
            return Err(Error::QuotaExceeded { needed: size, available: self.quota_bytes.saturating_sub(others) });
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.items.read().await.keys().cloned().collect())
    }

    async fn usage(&self) -> Result<StorageUsage, Error> {
        let items = self.items.read().await;
        Ok(StorageUsage { used_bytes: used_bytes(&items), quota_bytes: self.quota_bytes, entries: items.len() as u64 })
    }

    async fn clear(&self) -> Result<(), Error> {
        self.items.write().await.clear();
        Ok(())
    }
}
