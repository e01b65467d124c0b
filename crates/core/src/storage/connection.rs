//! SQLite storage backend with pragma configuration.
//!
//! This module handles opening the SQLite database, applying pragmas for
//! performance and concurrency (WAL mode), running migrations, and enforcing
//! the byte quota inside a single connection call.

use super::{Storage, StorageUsage, entry_size, migrations};
use crate::Error;
use async_trait::async_trait;
use std::path::Path;
use tokio_rusqlite::{Connection, params, rusqlite};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Persistent key/value store.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    pub(crate) conn: Connection,
    quota_bytes: u64,
}

impl SqliteStorage {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>, quota_bytes: u64) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn, quota_bytes).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory(quota_bytes: u64) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn, quota_bytes).await
    }

    async fn init(conn: Connection, quota_bytes: u64) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        let from_version = migrations::run(&conn).await?;
        if from_version < migrations::latest_version() {
            tracing::info!(from_version, to_version = migrations::latest_version(), "storage schema upgraded");
        }

        Ok(Self { conn, quota_bytes })
    }

    /// Configured quota in bytes.
    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;

                match stmt.query_row(params![key], |row| row.get(0)) {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let quota = self.quota_bytes;
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let size = entry_size(&key, &value);
                let others: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(size), 0) FROM kv_store WHERE key != ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                let others = others.max(0) as u64;

                if others + size > quota {
                    return Err(Error::QuotaExceeded { needed: size, available: quota.saturating_sub(others) });
                }

                conn.execute(
                    "INSERT INTO kv_store (key, value, size, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        size = excluded.size,
                        updated_at = excluded.updated_at",
                    params![key, value, size as i64, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove_item(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
                let keys = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn usage(&self) -> Result<StorageUsage, Error> {
        let quota_bytes = self.quota_bytes;
        self.conn
            .call(move |conn| -> Result<StorageUsage, Error> {
                let (used, entries): (i64, i64) =
                    conn.query_row("SELECT COALESCE(SUM(size), 0), COUNT(*) FROM kv_store", [], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?;
                Ok(StorageUsage { used_bytes: used.max(0) as u64, quota_bytes, entries: entries.max(0) as u64 })
            })
            .await
            .map_err(Error::from)
    }

    async fn clear(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM kv_store", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = SqliteStorage::open_in_memory(1024).await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
        assert_eq!(db.quota_bytes(), 1024);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let db = SqliteStorage::open_in_memory(1024).await.unwrap();
        db.set_item("movies_1", r#"{"page":1}"#).await.unwrap();

        assert_eq!(db.get_item("movies_1").await.unwrap().as_deref(), Some(r#"{"page":1}"#));
        assert!(db.get_item("movies_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let db = SqliteStorage::open_in_memory(1024).await.unwrap();
        db.set_item("k", "old").await.unwrap();
        db.set_item("k", "newer").await.unwrap();

        assert_eq!(db.get_item("k").await.unwrap().as_deref(), Some("newer"));
        let usage = db.usage().await.unwrap();
        assert_eq!(usage.entries, 1);
        assert_eq!(usage.used_bytes, 6);
    }

    #[tokio::test]
    async fn test_quota_exceeded_keeps_previous_value() {
        let db = SqliteStorage::open_in_memory(20).await.unwrap();
        db.set_item("a", "0123456789").await.unwrap();

        let err = db.set_item("b", "0123456789").await.unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { needed: 11, available: 9 }));

        let err = db.set_item("a", "01234567890123456789").await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(db.get_item("a").await.unwrap().as_deref(), Some("0123456789"));
    }

    #[tokio::test]
    async fn test_replacing_counts_only_new_size() {
        let db = SqliteStorage::open_in_memory(12).await.unwrap();
        db.set_item("a", "0123456789").await.unwrap();
        db.set_item("a", "abcdefghij").await.unwrap();
        assert_eq!(db.usage().await.unwrap().used_bytes, 11);
    }

    #[tokio::test]
    async fn test_remove_keys_and_clear() {
        let db = SqliteStorage::open_in_memory(1024).await.unwrap();
        db.set_item("b", "2").await.unwrap();
        db.set_item("a", "1").await.unwrap();

        assert_eq!(db.keys().await.unwrap(), vec!["a".to_string(), "b".to_string()]);

        db.remove_item("a").await.unwrap();
        db.remove_item("missing").await.unwrap();
        assert_eq!(db.keys().await.unwrap(), vec!["b".to_string()]);

        db.clear().await.unwrap();
        assert_eq!(db.usage().await.unwrap().entries, 0);
    }
}
